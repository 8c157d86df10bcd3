//! Column resolution for the convertible-bond listing header.
//!
//! The host page renames, reorders and re-renders its header freely, so field
//! positions are looked up by label fragment on every refresh instead of being
//! hard-coded.

use std::fmt;

/// A logical field the three-low score depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Current bond price
    Price,
    /// Underlying stock price
    StockPrice,
    /// Underlying stock price-to-book ratio
    BookRatio,
    /// Conversion premium rate, rendered with a trailing `%`
    Premium,
    /// Forced-redemption status text
    RedeemStatus,
    /// Remaining term, in years or (when under a year) in days
    RemainingTerm,
    /// Outstanding scale, in hundred-million yuan
    Scale,
}

impl Field {
    /// Every field, in the order they are reported when unresolved.
    pub const ALL: [Field; 7] = [
        Field::Price,
        Field::StockPrice,
        Field::BookRatio,
        Field::Premium,
        Field::RedeemStatus,
        Field::RemainingTerm,
        Field::Scale,
    ];

    /// Header label fragment identifying this field's column.
    pub fn label(self) -> &'static str {
        match self {
            Field::Price => "现价",
            Field::StockPrice => "正股价",
            Field::BookRatio => "正股PB",
            Field::Premium => "转股溢价率",
            Field::RedeemStatus => "强赎状态",
            Field::RemainingTerm => "剩余年限",
            Field::Scale => "剩余规模",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Price => "price",
            Field::StockPrice => "stock price",
            Field::BookRatio => "book ratio",
            Field::Premium => "premium rate",
            Field::RedeemStatus => "redemption status",
            Field::RemainingTerm => "remaining term",
            Field::Scale => "outstanding scale",
        };
        write!(f, "{} ({})", name, self.label())
    }
}

/// Positions of every required field within a row's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndexMap {
    pub price: usize,
    pub stock_price: usize,
    pub book_ratio: usize,
    pub premium: usize,
    pub redeem_status: usize,
    pub remaining_term: usize,
    pub scale: usize,
}

impl FieldIndexMap {
    /// Cell index of `field`.
    pub fn index(&self, field: Field) -> usize {
        match field {
            Field::Price => self.price,
            Field::StockPrice => self.stock_price,
            Field::BookRatio => self.book_ratio,
            Field::Premium => self.premium,
            Field::RedeemStatus => self.redeem_status,
            Field::RemainingTerm => self.remaining_term,
            Field::Scale => self.scale,
        }
    }
}

/// One or more required columns were not found in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingColumns(pub Vec<Field>);

impl fmt::Display for MissingColumns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|field| field.to_string()).collect();
        write!(f, "missing columns: {}", names.join(", "))
    }
}

impl std::error::Error for MissingColumns {}

/// Strip every whitespace character, the way header labels are compared.
pub fn normalize_header(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Locate every required field in `headers`.
///
/// Each field maps to the first header whose normalized text contains the
/// field's label fragment. Fails with the full list of unresolved fields.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> Result<FieldIndexMap, MissingColumns> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| normalize_header(h.as_ref()))
        .collect();

    let find = |field: Field| normalized.iter().position(|h| h.contains(field.label()));

    let mut missing = Vec::new();
    let mut lookup = |field: Field| match find(field) {
        Some(idx) => idx,
        None => {
            missing.push(field);
            0
        }
    };

    let map = FieldIndexMap {
        price: lookup(Field::Price),
        stock_price: lookup(Field::StockPrice),
        book_ratio: lookup(Field::BookRatio),
        premium: lookup(Field::Premium),
        redeem_status: lookup(Field::RedeemStatus),
        remaining_term: lookup(Field::RemainingTerm),
        scale: lookup(Field::Scale),
    };

    if missing.is_empty() {
        Ok(map)
    } else {
        Err(MissingColumns(missing))
    }
}
