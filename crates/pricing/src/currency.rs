use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PricingError;

/// Currencies the shop can quote in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Irr,
    Usd,
    Eur,
    Aed,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Irr, Currency::Usd, Currency::Eur, Currency::Aed];

    /// ISO 4217 code.
    pub fn code(self) -> &'static str {
        match self {
            Currency::Irr => "IRR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Aed => "AED",
        }
    }
}

impl FromStr for Currency {
    type Err = PricingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(PricingError::UnsupportedCurrency { code })
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" IRR ".parse::<Currency>().unwrap(), Currency::Irr);
    }

    #[test]
    fn unknown_code_is_unsupported() {
        match "XAU".parse::<Currency>().unwrap_err() {
            PricingError::UnsupportedCurrency { code } => assert_eq!(code, "XAU"),
            _ => panic!("Expected UnsupportedCurrency"),
        }
    }
}
