//! Swap validation
//!
//! [`validate_swap`] is a pure function of the current form, balances and adapter
//! state. The order of the checks is a priority: the first match wins.

use std::fmt;

use crate::amount::{has_decimals_overflow, AmountValue};
use crate::error::QuoteError;
use crate::token::{BlockchainToken, CoinType};

/// Verdict that blocks (or, for allowance, redirects) submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwapValidationError {
    FromAmountDecimalsOverflow,
    ToAmountDecimalsOverflow,
    InsufficientBalance,
    InsufficientFundsForGas,
    InsufficientAllowance,
    InsufficientLiquidity,
    UnknownError,
}

impl fmt::Display for SwapValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FromAmountDecimalsOverflow => "fromAmountDecimalsOverflow",
            Self::ToAmountDecimalsOverflow => "toAmountDecimalsOverflow",
            Self::InsufficientBalance => "insufficientBalance",
            Self::InsufficientFundsForGas => "insufficientFundsForGas",
            Self::InsufficientAllowance => "insufficientAllowance",
            Self::InsufficientLiquidity => "insufficientLiquidity",
            Self::UnknownError => "unknownError",
        };
        f.write_str(name)
    }
}

/// Everything the verdict depends on. Amounts are display units; balances and
/// fees are base units.
#[derive(Debug, Clone)]
pub struct ValidationInput<'a> {
    pub from_amount: &'a str,
    pub to_amount: &'a str,
    pub from_token: Option<&'a BlockchainToken>,
    pub to_token: Option<&'a BlockchainToken>,
    pub coin: CoinType,
    pub fees_wrapped: &'a AmountValue,
    pub from_asset_balance: &'a AmountValue,
    pub native_asset_balance: &'a AmountValue,
    pub adapter_error: Option<&'a QuoteError>,
    pub adapter_has_allowance: bool,
    /// `None` until the adapter has produced a quote
    pub adapter_quote_route_count: Option<usize>,
}

fn overflows(amount: &str, token: Option<&BlockchainToken>) -> bool {
    match token {
        Some(token) if !amount.trim().is_empty() => has_decimals_overflow(amount, token),
        _ => false,
    }
}

pub fn validate_swap(input: &ValidationInput<'_>) -> Option<SwapValidationError> {
    if input.from_amount.trim().is_empty() && input.to_amount.trim().is_empty() {
        return None;
    }

    if overflows(input.from_amount, input.from_token) {
        return Some(SwapValidationError::FromAmountDecimalsOverflow);
    }
    if overflows(input.to_amount, input.to_token) {
        return Some(SwapValidationError::ToAmountDecimalsOverflow);
    }

    // balances still loading
    if input.from_asset_balance.is_undefined() || input.native_asset_balance.is_undefined() {
        return None;
    }

    let from_amount_base = match input.from_token {
        Some(token) => AmountValue::new(input.from_amount).multiply_by_decimals(token.decimals),
        None => AmountValue::undefined(),
    };

    if from_amount_base.gt(input.from_asset_balance) {
        return Some(SwapValidationError::InsufficientBalance);
    }

    if input.fees_wrapped.gt(input.native_asset_balance) {
        return Some(SwapValidationError::InsufficientFundsForGas);
    }
    // native sells draw amount and fee from the same balance
    let from_is_native = input.from_token.is_some_and(BlockchainToken::is_native);
    if from_is_native
        && from_amount_base
            .plus(input.fees_wrapped)
            .gt(input.native_asset_balance)
    {
        return Some(SwapValidationError::InsufficientFundsForGas);
    }

    let has_routes = matches!(input.adapter_quote_route_count, Some(count) if count > 0);

    if input.coin == CoinType::Eth
        && !from_is_native
        && input.adapter_error.is_none()
        && has_routes
        && !input.adapter_has_allowance
    {
        return Some(SwapValidationError::InsufficientAllowance);
    }

    match input.adapter_error {
        Some(err) if err.is_insufficient_liquidity() => Some(SwapValidationError::InsufficientLiquidity),
        Some(_) => Some(SwapValidationError::UnknownError),
        None if input.coin == CoinType::Sol && input.adapter_quote_route_count == Some(0) => {
            Some(SwapValidationError::InsufficientLiquidity)
        }
        None => None,
    }
}

/// Label of the submit control for a verdict
pub fn submit_button_text(
    verdict: Option<SwapValidationError>,
    from_amount: &str,
    to_amount: &str,
    from_symbol: &str,
) -> String {
    if from_amount.trim().is_empty() && to_amount.trim().is_empty() {
        return "Enter an amount".to_string();
    }

    match verdict {
        Some(SwapValidationError::InsufficientBalance) => format!("Insufficient {} balance", from_symbol),
        Some(SwapValidationError::InsufficientFundsForGas) => "Insufficient funds for gas".to_string(),
        Some(SwapValidationError::InsufficientAllowance) => format!("Approve {}", from_symbol),
        Some(SwapValidationError::InsufficientLiquidity) => "Insufficient liquidity".to_string(),
        Some(SwapValidationError::FromAmountDecimalsOverflow)
        | Some(SwapValidationError::ToAmountDecimalsOverflow) => "Not enough decimals precision".to_string(),
        Some(SwapValidationError::UnknownError) => "Unknown error".to_string(),
        None => "Review order".to_string(),
    }
}

/// Allowance is the only verdict that keeps the control enabled; it becomes the
/// approve action.
pub fn is_submit_disabled(
    verdict: Option<SwapValidationError>,
    loading: bool,
    from_amount: &str,
    to_amount: &str,
) -> bool {
    let unusable = |raw: &str| {
        let amount = AmountValue::new(raw);
        amount.is_undefined() || amount.is_zero()
    };

    loading
        || unusable(from_amount)
        || unusable(to_amount)
        || matches!(verdict, Some(v) if v != SwapValidationError::InsufficientAllowance)
}
