//! Newton-Raphson step limiting.
//!
//! Each function takes the voltage proposed by the solver and the value
//! from the previous iteration and returns a damped voltage. All of them
//! are stateless and return finite values for finite input.

/// Step of [`limit_exponential_arg`]: `sqrt(e) - 0.5`.
pub const EXP_ARG_STEP: f64 = 1.148_721_270_700_128;

/// Log bias of the junction limiter above `vcrit`.
const JUNCTION_LOG_BIAS: f64 = 2.0;
/// Offset of the junction limiter floor for negative swings.
const JUNCTION_FLOOR: f64 = 1.8;

/// Limit a drain-source voltage step.
pub fn limit_drain_source_voltage(vnew: f64, vold: f64) -> f64 {
    if vold >= 3.5 {
        if vnew > vold {
            vnew.min(3.0 * vold + 2.0)
        } else if vnew < 3.5 {
            vnew.max(2.0)
        } else {
            vnew
        }
    } else if vnew > vold {
        vnew.min(4.0)
    } else {
        vnew.max(-0.5)
    }
}

/// Limit a pn-junction voltage step.
///
/// Above `vcrit` a large forward step is compressed logarithmically.
/// Negative swings are floored at `-vold - 1.8` (or `2*vold - 1.8` when the
/// junction was already reverse biased). Returns the limited voltage and
/// whether limiting occurred.
pub fn limit_junction_voltage(vnew: f64, vold: f64, vt: f64, vcrit: f64) -> (f64, bool) {
    let delta = vnew - vold;
    if vnew > vcrit && delta.abs() > JUNCTION_LOG_BIAS * vt {
        let v = if vold > 0.0 {
            if delta > 0.0 {
                vold + vt * (JUNCTION_LOG_BIAS + (delta / vt - 1.0).ln())
            } else {
                vcrit
            }
        } else {
            vt * (vnew / vt).ln()
        };
        return (v, true);
    }
    if vnew < 0.0 {
        let floor = if vold > 0.0 {
            -vold - JUNCTION_FLOOR
        } else {
            2.0 * vold - JUNCTION_FLOOR
        };
        if vnew < floor {
            return (floor, true);
        }
    }
    (vnew, false)
}

/// Limit a gate-source voltage step around threshold `vto`.
pub fn limit_fet_voltage(vnew: f64, vold: f64, vto: f64) -> f64 {
    let vtsthi = (2.0 * (vold - vto)).abs() + 2.0;
    let vtstlo = (vold - vto).abs() + 1.0;
    let vtox = vto + 3.5;
    let delv = vnew - vold;

    if vold >= vto {
        if vold >= vtox {
            if delv <= 0.0 {
                // going off
                if vnew >= vtox {
                    if -delv > vtstlo {
                        return vold - vtstlo;
                    }
                    vnew
                } else {
                    vnew.max(vto + 2.0)
                }
            } else if delv >= vtsthi {
                vold + vtsthi
            } else {
                vnew
            }
        } else if delv <= 0.0 {
            vnew.max(vto - 0.5)
        } else {
            vnew.min(vto + 4.0)
        }
    } else if delv <= 0.0 {
        if -delv > vtsthi {
            vold - vtsthi
        } else {
            vnew
        }
    } else {
        let vtemp = vto + 0.5;
        if vnew <= vtemp {
            if delv > vtstlo {
                vold + vtstlo
            } else {
                vnew
            }
        } else {
            vtemp
        }
    }
}

/// Limit the argument of an exponential so one step grows it by at most
/// a logarithmic amount past [`EXP_ARG_STEP`].
pub fn limit_exponential_arg(vnew: f64, vold: f64) -> (f64, bool) {
    let delta = vnew - vold;
    if delta > EXP_ARG_STEP {
        let v = vold + EXP_ARG_STEP * (1.0 + (delta / EXP_ARG_STEP).ln());
        (v, true)
    } else {
        (vnew, false)
    }
}
