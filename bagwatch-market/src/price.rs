//! Price presentation.

use bagwatch_core::Price;

/// Renders a [`Price`] for match messages.
pub trait PriceFormatter: Send + Sync {
    /// Formats `price`.
    fn format(&self, price: &Price) -> String;
}

/// Two decimals, `€` suffix for EUR, `$` prefix for USD, code suffix otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPriceFormatter;

impl PriceFormatter for DefaultPriceFormatter {
    fn format(&self, price: &Price) -> String {
        let amount = price.amount();
        match price.code.to_ascii_uppercase().as_str() {
            "EUR" => format!("{amount:.2} €"),
            "USD" => format!("${amount:.2}"),
            _ => format!("{amount:.2} {}", price.code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(minor_units: i64, decimals: u32, code: &str) -> Price {
        Price {
            minor_units,
            decimals,
            code: code.into(),
        }
    }

    #[test]
    fn test_currency_glyphs() {
        let f = DefaultPriceFormatter;
        assert_eq!(f.format(&price(1250, 2, "EUR")), "12.50 €");
        assert_eq!(f.format(&price(1250, 2, "USD")), "$12.50");
        assert_eq!(f.format(&price(1250, 2, "GBP")), "12.50 GBP");
    }

    #[test]
    fn test_decimals() {
        let f = DefaultPriceFormatter;
        assert_eq!(f.format(&price(5, 0, "EUR")), "5.00 €");
        assert_eq!(f.format(&price(3999, 3, "DKK")), "4.00 DKK");
    }
}
