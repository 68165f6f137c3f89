//! Watchlist model and text format.
//!
//! A watchlist is a plain-text file with bracketed section headers:
//!
//! ```text
//! # comment
//! [equities]
//! AAPL
//! MSFT
//! [indices]
//! I:SPX
//! [crypto]
//! X:BTCUSD
//! [treasury]
//! 2Y
//! 10Y
//! [economy]
//! unemployment
//! cpi_yoy
//! ```
//!
//! `[treasury]` and `[economy]` list display keys for the macro panels.

use super::ticker::AssetClass;

/// Section names recognized in a watchlist file.
pub const SECTIONS: [&str; 5] = ["equities", "indices", "crypto", "treasury", "economy"];

/// Parsed watchlist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    /// Display name, usually the file stem.
    pub name: String,
    pub stocks: Vec<String>,
    pub indices: Vec<String>,
    pub crypto: Vec<String>,
    /// Treasury yield keys (`1M` ... `30Y`).
    pub treasury: Vec<String>,
    /// Economy indicator keys (`unemployment`, `cpi`, ...).
    pub economy: Vec<String>,
}

impl Watchlist {
    /// Parse watchlist text.
    ///
    /// Blank lines and `#` comments are skipped. Lines under an
    /// unrecognized header are ignored, as are lines before the first
    /// header. Symbols are kept in file order; duplicates are dropped.
    pub fn parse(name: impl Into<String>, text: &str) -> Self {
        let mut list = Self {
            name: name.into(),
            ..Self::default()
        };
        let mut section: Option<usize> = None;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(header) = section_header(line) {
                let lower = header.to_ascii_lowercase();
                section = SECTIONS.iter().position(|s| *s == lower);
                continue;
            }

            let target = match section {
                Some(0) => &mut list.stocks,
                Some(1) => &mut list.indices,
                Some(2) => &mut list.crypto,
                Some(3) => &mut list.treasury,
                Some(4) => &mut list.economy,
                _ => continue,
            };
            if !target.iter().any(|s| s == line) {
                target.push(line.to_string());
            }
        }
        list
    }

    /// Symbols for one asset class, in watchlist order.
    pub fn symbols(&self, class: AssetClass) -> &[String] {
        match class {
            AssetClass::Stocks => &self.stocks,
            AssetClass::Indices => &self.indices,
            AssetClass::Crypto => &self.crypto,
        }
    }

    /// Total ticker count across the three asset classes.
    pub fn ticker_count(&self) -> usize {
        self.stocks.len() + self.indices.len() + self.crypto.len()
    }

    /// No tickers at all. Treasury/economy keys alone do not count.
    pub fn is_empty(&self) -> bool {
        self.ticker_count() == 0
    }

    /// Classes with at least one symbol.
    pub fn active_classes(&self) -> Vec<AssetClass> {
        AssetClass::ALL
            .into_iter()
            .filter(|c| !self.symbols(*c).is_empty())
            .collect()
    }
}

/// Whether the text has at least one recognized section header.
pub fn has_known_section(text: &str) -> bool {
    text.lines()
        .filter_map(|l| section_header(l.trim()))
        .any(|h| SECTIONS.contains(&h.to_ascii_lowercase().as_str()))
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}
