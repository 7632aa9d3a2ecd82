//! POLY(n) expansion into an explicit function expression.
//!
//! Coefficients pair with monomials in SPICE2 order: the constant, the
//! linear terms, then each higher degree with the exponent of the first
//! variable decreasing fastest (`1, x1, x2, x1^2, x1*x2, x2^2, x1^3, ...`).

/// Step `powers` to the next monomial in SPICE2 order.
pub fn next_powers(powers: &mut [u32]) {
    let n = powers.len();
    if n == 0 {
        return;
    }
    if n == 1 {
        powers[0] += 1;
        return;
    }
    match (0..n - 1).rev().find(|&i| powers[i] != 0) {
        Some(i) => {
            let tail = powers[n - 1];
            powers[n - 1] = 0;
            powers[i] -= 1;
            powers[i + 1] = tail + 1;
        }
        None => {
            let total = powers[n - 1];
            powers[n - 1] = 0;
            powers[0] = total + 1;
        }
    }
}

/// Build the expression text for a polynomial of `vars` with SPICE2
/// coefficient order.
///
/// The constant term is always written; zero higher-order terms are
/// skipped. A single coefficient of a one-variable polynomial is the
/// linear gain.
pub fn expand(vars: &[String], coeffs: &[f64]) -> String {
    let single_linear = vars.len() == 1 && coeffs.len() == 1;
    let coeffs: Vec<f64> = if single_linear {
        vec![0.0, coeffs[0]]
    } else {
        coeffs.to_vec()
    };

    let mut powers = vec![0u32; vars.len()];
    let mut terms = Vec::with_capacity(coeffs.len());
    for (k, &c) in coeffs.iter().enumerate() {
        if k == 0 {
            terms.push(format!("{}", c));
        } else {
            next_powers(&mut powers);
            if c != 0.0 {
                terms.push(monomial(c, vars, &powers));
            }
        }
    }
    if terms.is_empty() {
        return "0".to_string();
    }
    terms.join(" + ")
}

fn monomial(c: f64, vars: &[String], powers: &[u32]) -> String {
    let mut s = format!("{}", c);
    for (var, &p) in vars.iter().zip(powers) {
        match p {
            0 => {}
            1 => {
                s.push('*');
                s.push_str(var);
            }
            _ => {
                s.push('*');
                s.push_str(var);
                s.push('^');
                s.push_str(&p.to_string());
            }
        }
    }
    s
}

/// Variable text for a controlling node pair.
pub fn node_var(pos: &str, neg: &str) -> String {
    if devlib_core::node::is_ground_name(neg) {
        format!("v({})", pos)
    } else {
        format!("v({},{})", pos, neg)
    }
}

/// Variable text for a controlling source current.
pub fn current_var(source: &str) -> String {
    format!("i({})", source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence(n: usize, count: usize) -> Vec<Vec<u32>> {
        let mut p = vec![0u32; n];
        let mut out = vec![p.clone()];
        for _ in 1..count {
            next_powers(&mut p);
            out.push(p.clone());
        }
        out
    }

    #[test]
    fn test_two_variable_order() {
        assert_eq!(
            sequence(2, 10),
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2],
                vec![3, 0],
                vec![2, 1],
                vec![1, 2],
                vec![0, 3],
            ]
        );
    }

    #[test]
    fn test_three_variable_order() {
        let seq = sequence(3, 11);
        assert_eq!(seq[4], vec![2, 0, 0]);
        assert_eq!(seq[5], vec![1, 1, 0]);
        assert_eq!(seq[6], vec![1, 0, 1]);
        assert_eq!(seq[7], vec![0, 2, 0]);
        assert_eq!(seq[8], vec![0, 1, 1]);
        assert_eq!(seq[9], vec![0, 0, 2]);
        assert_eq!(seq[10], vec![3, 0, 0]);
    }

    #[test]
    fn test_poly1_linear() {
        let vars = vec![node_var("a", "0")];
        assert_eq!(expand(&vars, &[1.5, 2.0]), "1.5 + 2*v(a)");
        assert_eq!(expand(&vars, &[3.0]), "0 + 3*v(a)");
    }

    #[test]
    fn test_poly2_terms() {
        let vars = vec![node_var("1", "2"), current_var("vx")];
        assert_eq!(
            expand(&vars, &[0.0, 1.0, 0.0, 4.0, 5.0]),
            "0 + 1*v(1,2) + 4*v(1,2)^2 + 5*v(1,2)*i(vx)"
        );
    }
}
