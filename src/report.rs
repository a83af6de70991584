//! Pretty-prints `base + delta`, grouped the way the engine's source files
//! group them, with large swings highlighted.

use colored::Colorize;

use crate::params::{Group, Phased, PhasedVector, Scorepair, ScorepairVector, GROUPS};

/// A parameter swing large enough from its base value to call out in the
/// printed report.
const HIGHLIGHT_THRESHOLD: f64 = 40.0;

fn rounded(base: Scorepair, delta: Phased) -> (i32, i32) {
    ((f64::from(base.mg) + delta.mg).round() as i32, (f64::from(base.eg) + delta.eg).round() as i32)
}

fn format_pair(base: Scorepair, delta: Phased) -> String {
    let (mg, eg) = rounded(base, delta);
    let text = format!("({mg}, {eg})");
    if delta.mg.abs() >= HIGHLIGHT_THRESHOLD || delta.eg.abs() >= HIGHLIGHT_THRESHOLD {
        text.red().to_string()
    } else {
        text
    }
}

fn print_group(group: &Group, base: &ScorepairVector, delta: &PhasedVector) {
    println!("\n// {} [{}..{}]", group.name, group.start, group.start + group.count);
    for i in group.start..group.start + group.count {
        print!("{}", format_pair(base[i], delta[i]));
        if (i - group.start) % 4 == 3 || i + 1 == group.start + group.count {
            println!();
        } else {
            print!(", ");
        }
    }
}

/// Dumps the whole parameter set, grouped in declaration order.
pub fn dump(base: &ScorepairVector, delta: &PhasedVector) {
    println!("\n Parameters:");
    for group in GROUPS {
        print_group(group, base, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn rounds_base_plus_delta() {
        let base = Scorepair::new(10, -5);
        let delta = Phased::new(0.6, -0.4);
        assert_eq!(rounded(base, delta), (11, -5));
    }

    #[test]
    fn dump_does_not_panic_on_the_default_parameter_set() {
        let base = params::base_values();
        let delta = vec![Phased::ZERO; params::PARAM_COUNT];
        dump(&base, &delta);
    }
}
