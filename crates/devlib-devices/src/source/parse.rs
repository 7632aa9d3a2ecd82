//! Source line grammar.
//!
//! `<key><name> n+ n- [nc+ nc- | csrc] [poly(n) ... | function f | vol=f |
//! cur=f] [value] [[dc] v] [ac [mag [phase]] | ac table] [acmag m]
//! [acphase p] [actable t] [gain g [gi]] [distof1 m [p]] [distof2 m [p]]`

use devlib_core::{Circuit, Cursor, DeckLine};

use super::params::ac_rect;
use super::poly;
use super::{Dependency, SourceType, SrcDevice, SrcInstance};
use crate::device::{DEFAULT_MODEL, ModelTable};
use crate::error::Result;
use crate::expression::{Controller, ParseTree};

const KEYWORDS: &[&str] = &[
    "function", "func", "vol", "cur", "dc", "ac", "acmag", "acphase", "actable", "gain",
    "distof1", "distof2",
];

/// Whether the next token is a source keyword.
///
/// A lone `v` or `i` is a keyword unless the next source character is a
/// parenthesis, which makes it the start of `v(...)` / `i(...)`.
fn at_keyword(cur: &Cursor<'_>) -> bool {
    let Some(tok) = cur.peek_token() else {
        return false;
    };
    let lower = tok.to_ascii_lowercase();
    if KEYWORDS.contains(&lower.as_str()) || poly_token(&lower) {
        return true;
    }
    (lower == "v" || lower == "i") && !matches!(cur.char_after_token(), Some('(' | ')'))
}

fn poly_token(lower: &str) -> bool {
    lower == "poly" || (lower.starts_with("poly") && lower[4..].starts_with('('))
}

/// First lead value seen; later ones are ignored with a warning.
enum Lead {
    None,
    Value(f64, Option<f64>),
    Tree(ParseTree),
}

impl Lead {
    fn describe(&self) -> String {
        match self {
            Lead::None => String::new(),
            Lead::Value(v, None) => format!("{}", v),
            Lead::Value(v, Some(im)) => format!("{} {}", v, im),
            Lead::Tree(t) => t.to_string(),
        }
    }
}

struct LineParser<'a, 'b> {
    cur: Cursor<'a>,
    line: &'b mut DeckLine,
    inst: SrcInstance,
    lead: Lead,
    /// "DC" for independent sources, "gain" for dependent ones.
    leadname: &'static str,
}

impl LineParser<'_, '_> {
    fn fatal(&mut self, ckt: &mut Circuit, msg: &str) {
        let msg = format!("{}: {}", self.inst.name, msg);
        self.line.diag.fatal(ckt, msg);
    }

    fn warn(&mut self, msg: String) {
        let msg = format!("{}: {}", self.inst.name, msg);
        self.line.diag.warn(msg);
    }

    fn set_lead(&mut self, lead: Lead) {
        if matches!(self.lead, Lead::None) {
            self.lead = lead;
        } else {
            let kept = self.lead.describe();
            self.warn(format!("ambiguous {} value, using {}", self.leadname, kept));
        }
    }

    /// Parse a function at the cursor, quoted or bare.
    fn function(&mut self, ckt: &mut Circuit) -> Option<ParseTree> {
        self.cur.skip_delims();
        let rest = self.cur.rest();
        let close = match rest.chars().next() {
            Some('\'') => Some('\''),
            Some('"') => Some('"'),
            Some('{') => Some('}'),
            _ => None,
        };
        let parsed = match close {
            Some(c) => match rest[1..].find(c) {
                Some(end) => {
                    let inner = &rest[1..1 + end];
                    self.cur.advance(end + 2);
                    ParseTree::parse(inner)
                }
                None => {
                    self.fatal(ckt, "unterminated function");
                    return None;
                }
            },
            None => ParseTree::parse_prefix(rest).map(|(tree, used)| {
                self.cur.advance(used);
                tree
            }),
        };
        match parsed {
            Ok(tree) => Some(tree),
            Err(e) => {
                self.fatal(ckt, &format!("bad function: {}", e));
                None
            }
        }
    }

    /// `poly(n)` followed by controllers and coefficients.
    fn poly(&mut self, ckt: &mut Circuit, token: &str) -> Option<ParseTree> {
        let lower = token.to_ascii_lowercase();
        let inner = if lower == "poly" {
            self.cur.next_token().unwrap_or("").to_string()
        } else {
            lower[4..].to_string()
        };
        let degree = inner
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|&n| n > 0);
        let Some(n) = degree else {
            self.fatal(ckt, "bad poly degree");
            return None;
        };

        let current_controlled = matches!(self.inst.key, 'f' | 'h');
        let mut vars = Vec::with_capacity(n);
        for _ in 0..n {
            if current_controlled {
                let Some(src) = self.cur.next_token() else {
                    self.fatal(ckt, "missing poly controlling source");
                    return None;
                };
                vars.push(poly::current_var(&src.to_ascii_lowercase()));
            } else {
                let (Some(p), Some(m)) = (self.cur.next_token(), self.cur.next_token()) else {
                    self.fatal(ckt, "missing poly controlling nodes");
                    return None;
                };
                ckt.node(p);
                ckt.node(m);
                vars.push(poly::node_var(&p.to_ascii_lowercase(), &m.to_ascii_lowercase()));
            }
        }

        let mut coeffs = Vec::new();
        while let Some(c) = self.cur.next_value() {
            coeffs.push(c);
        }
        if coeffs.is_empty() {
            self.fatal(ckt, "missing poly coefficients");
            return None;
        }
        let text = poly::expand(&vars, &coeffs);
        log::debug!("{}: poly({}) -> {}", self.inst.name, n, text);
        match ParseTree::parse(&text) {
            Ok(tree) => Some(tree),
            Err(e) => {
                self.fatal(ckt, &format!("bad poly expansion: {}", e));
                None
            }
        }
    }

    fn optional_pair(&mut self) -> (Option<f64>, Option<f64>) {
        let a = self.cur.next_value();
        let b = a.and_then(|_| self.cur.next_value());
        (a, b)
    }

    /// Returns false after a fatal error.
    fn keyword(&mut self, ckt: &mut Circuit, tok: &str) -> bool {
        let lower = tok.to_ascii_lowercase();
        if poly_token(&lower) {
            self.cur.next_token();
            return match self.poly(ckt, tok) {
                Some(tree) => {
                    self.set_lead(Lead::Tree(tree));
                    true
                }
                None => false,
            };
        }
        self.cur.next_token();
        match lower.as_str() {
            "function" | "func" | "vol" | "cur" | "v" | "i" => {
                match lower.as_str() {
                    "vol" | "v" => self.inst.src_type = SourceType::Voltage,
                    "cur" | "i" => self.inst.src_type = SourceType::Current,
                    _ => {}
                }
                match self.function(ckt) {
                    Some(tree) => self.set_lead(Lead::Tree(tree)),
                    None => return false,
                }
            }
            "dc" => match self.cur.next_value() {
                Some(v) if self.leadname == "DC" => self.set_lead(Lead::Value(v, None)),
                Some(v) => {
                    self.inst.dc_value = v;
                    self.inst.dc_given = true;
                }
                None => self.warn("missing DC value".to_string()),
            },
            "ac" => {
                self.inst.ac_given = true;
                let (mag, phase) = self.optional_pair();
                match mag {
                    Some(m) => {
                        self.inst.ac_mag = m;
                        self.inst.ac_phase = phase.unwrap_or(0.0);
                    }
                    None if !at_keyword(&self.cur) && !self.cur.at_end() => {
                        let name = self.cur.next_token().unwrap_or_default();
                        self.inst.ac_table = Some(name.to_ascii_lowercase());
                    }
                    None => self.inst.ac_mag = 1.0,
                }
            }
            "acmag" | "acphase" => match self.cur.next_value() {
                Some(v) => {
                    self.inst.ac_given = true;
                    if lower == "acmag" {
                        self.inst.ac_mag = v;
                    } else {
                        self.inst.ac_phase = v;
                    }
                }
                None => self.warn(format!("missing {} value", lower)),
            },
            "actable" => match self.cur.next_token() {
                Some(name) => {
                    self.inst.ac_given = true;
                    self.inst.ac_table = Some(name.to_ascii_lowercase());
                }
                None => self.warn("missing AC table name".to_string()),
            },
            "gain" => match self.optional_pair() {
                (Some(re), im) => {
                    if self.leadname == "gain" {
                        self.set_lead(Lead::Value(re, im));
                    } else {
                        self.inst.gain = re;
                        self.inst.gain_imag = im.unwrap_or(0.0);
                        self.inst.gain_given = true;
                    }
                }
                (None, _) => self.warn("missing gain value".to_string()),
            },
            "distof1" | "distof2" => {
                let (mag, phase) = self.optional_pair();
                let d = Some((mag.unwrap_or(1.0), phase.unwrap_or(0.0)));
                if lower == "distof1" {
                    self.inst.distof1 = d;
                } else {
                    self.inst.distof2 = d;
                }
            }
            _ => {}
        }
        true
    }

    /// Whatever is not a keyword is a lead value or function.
    ///
    /// Plain numbers are read one token at a time, so `5 -6` is two lead
    /// values rather than the difference. A gain takes a second number as
    /// its imaginary part.
    fn residual(&mut self, tok: &str) {
        if let Some(v) = self.cur.next_value() {
            let im = self.imaginary_part();
            self.set_lead(Lead::Value(v, im));
            return;
        }
        match ParseTree::parse_prefix(self.cur.rest()) {
            Ok((tree, used)) if used > 0 => {
                self.cur.advance(used);
                match tree.constant_value() {
                    Some(v) => {
                        let im = self.imaginary_part();
                        self.set_lead(Lead::Value(v, im));
                    }
                    None => self.set_lead(Lead::Tree(tree)),
                }
            }
            _ => {
                self.cur.next_token();
                self.warn(format!("unknown parameter '{}' ignored", tok));
            }
        }
    }

    fn imaginary_part(&mut self) -> Option<f64> {
        if self.leadname == "gain" {
            self.cur.next_value()
        } else {
            None
        }
    }

    /// Apply the lead value and check that the instance is complete.
    fn finish(&mut self, ckt: &mut Circuit) -> bool {
        let lead = std::mem::replace(&mut self.lead, Lead::None);
        let independent_key = matches!(self.inst.key, 'v' | 'i' | 'a');
        match lead {
            Lead::Value(v, im) => {
                if independent_key {
                    self.inst.dep = Dependency::Independent;
                    self.inst.dc_value = v;
                    self.inst.dc_given = true;
                } else {
                    self.inst.gain = v;
                    self.inst.gain_imag = im.unwrap_or(0.0);
                    self.inst.gain_given = true;
                }
            }
            Lead::Tree(tree) => {
                for c in tree.controllers() {
                    if let Controller::Node(n) = c {
                        ckt.node(n);
                    }
                }
                self.inst.dep = Dependency::of_tree(&tree);
                if self.inst.cont_pos.is_some() || self.inst.cont_name.is_some() {
                    self.warn("controlling nodes ignored with a function".to_string());
                    self.inst.cont_pos = None;
                    self.inst.cont_neg = None;
                    self.inst.cont_name = None;
                }
                self.inst.tree = Some(tree);
            }
            Lead::None => match self.inst.key {
                'a' => {
                    self.fatal(ckt, "missing function");
                    return false;
                }
                'e' | 'g' | 'f' | 'h' if !self.inst.gain_given => {
                    self.fatal(ckt, "missing gain");
                    return false;
                }
                _ => {}
            },
        }

        if self.inst.tree.is_none() {
            match self.inst.key {
                'e' | 'g' if self.inst.cont_pos.is_none() => {
                    self.fatal(ckt, "missing controlling nodes");
                    return false;
                }
                'f' | 'h' if self.inst.cont_name.is_none() => {
                    self.fatal(ckt, "missing controlling source");
                    return false;
                }
                _ => {}
            }
        }
        let ac = ac_rect(self.inst.ac_mag, self.inst.ac_phase);
        self.inst.ac_real = ac.re;
        self.inst.ac_imag = ac.im;
        true
    }
}

pub(super) fn parse_source(
    dev: &SrcDevice,
    type_index: usize,
    line: &mut DeckLine,
    ckt: &mut Circuit,
    models: &mut ModelTable,
) -> Result<()> {
    let text = line.text.clone();
    let mut cur = Cursor::new(&text);
    let Some(name) = cur.next_token() else {
        line.diag.fatal(ckt, "empty source line");
        return Ok(());
    };
    let key = name
        .chars()
        .next()
        .map_or('v', |c| c.to_ascii_lowercase());

    let (Some(p), Some(m)) = (cur.next_token(), cur.next_token()) else {
        line.diag.fatal(ckt, format!("{}: missing node", name));
        return Ok(());
    };
    let pos = ckt.node(p);
    let neg = ckt.node(m);
    let inst = SrcInstance::new(name, key, pos, neg);
    let leadname = if matches!(key, 'v' | 'i' | 'a') {
        "DC"
    } else {
        "gain"
    };
    let mut lp = LineParser {
        cur,
        line,
        inst,
        lead: Lead::None,
        leadname,
    };

    match key {
        'e' | 'g' if !at_keyword(&lp.cur) && !lp.cur.at_end() => {
            let (Some(cp), Some(cn)) = (lp.cur.next_token(), lp.cur.next_token()) else {
                lp.fatal(ckt, "missing controlling node");
                return Ok(());
            };
            lp.inst.cont_pos = Some(ckt.node(cp));
            lp.inst.cont_neg = Some(ckt.node(cn));
        }
        'f' | 'h' if !at_keyword(&lp.cur) => {
            if let Some(src) = lp.cur.next_token() {
                lp.inst.cont_name = Some(src.to_ascii_lowercase());
            }
        }
        _ => {}
    }

    while let Some(tok) = lp.cur.peek_token() {
        if at_keyword(&lp.cur) {
            if !lp.keyword(ckt, tok) {
                return Ok(());
            }
        } else {
            lp.residual(tok);
        }
    }

    if !lp.finish(ckt) {
        return Ok(());
    }
    let inst = lp.inst;
    log::debug!(
        "parsed {} ({:?} {:?}) {} {}",
        inst.name,
        inst.src_type,
        inst.dep,
        inst.pos,
        inst.neg
    );
    models.add_instance(type_index, DEFAULT_MODEL, dev, Box::new(inst))?;
    Ok(())
}
