//! Liquidity-source label parsing
//!
//! Multi-route backends describe each hop with a label such as
//! `"Cykura (95%) + Lifinity (5%)"`. Segments without a percentage take the
//! whole hop.

use crate::amount::AmountValue;
use crate::quote::LiquiditySource;

/// Parse a route label into its sources
pub fn parse_liquidity_sources(label: &str) -> Vec<LiquiditySource> {
    label
        .split('+')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(parse_segment)
        .collect()
}

/// `<name> (<integer>%)`, or the whole segment at proportion 1
fn parse_segment(segment: &str) -> LiquiditySource {
    match split_percentage(segment) {
        Some((name, percent)) => LiquiditySource {
            name: name.to_string(),
            proportion: AmountValue::from(percent).div(&AmountValue::from(100u64)),
        },
        None => LiquiditySource {
            name: segment.to_string(),
            proportion: AmountValue::new("1"),
        },
    }
}

fn split_percentage(segment: &str) -> Option<(&str, u64)> {
    let inner = segment.strip_suffix("%)")?;
    let open = inner.rfind('(')?;
    let digits = &inner[open + 1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let name = inner[..open].trim();
    // the pattern needs whitespace between name and "("
    if name.is_empty() || !inner[..open].ends_with(char::is_whitespace) {
        return None;
    }
    Some((name, digits.parse().ok()?))
}
