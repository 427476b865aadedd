//! # Cash Register Rules
//!
//! Balance arithmetic, movement checks and the closing summary of the cash
//! register. The database layer reads and writes rows; every decision about
//! what those rows should contain is made here.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   FECHADO ──open(x)──► ABERTO ──record_movement──► ABERTO               │
//! │      ▲                   │        entrada/venda  +amount                │
//! │      │                   │        saida/other    -amount                │
//! │      └─────close()───────┘                                              │
//! │                                                                         │
//! │   open:  ledger = [abertura x], opening = current = x                   │
//! │   close: ledger += fechamento, summary over the session, balances = 0   │
//! │   Neither close nor record_movement looks at the stored state.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{MovementKind, RegisterState};
use crate::validation::validate_movement_amount;
use crate::DEFAULT_CLOSING_OPERATOR;

/// Description written on the opening movement.
pub const OPENING_DESCRIPTION: &str = "Abertura de caixa";

/// Prefix of the description written on the closing movement.
pub const CLOSING_DESCRIPTION: &str = "Fechamento de caixa";

// =============================================================================
// Closing Summary
// =============================================================================

/// Figures reported when the register is closed.
///
/// `total_entries - total_exits + opening_balance == final_balance` for any
/// session driven through `record_movement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CashClosingSummary {
    #[ts(as = "String")]
    pub closed_at: NaiveDateTime,
    pub opening_balance: Money,
    pub total_entries: Money,
    pub total_exits: Money,
    /// Balance just before closing.
    pub final_balance: Money,
    /// Amount the operator counted, or the balance when none was given.
    pub declared_amount: Money,
    /// `declared_amount - final_balance`. Negative means cash is missing.
    pub difference: Money,
}

impl CashClosingSummary {
    /// Builds the summary from the session's ledger.
    pub fn from_session<'a, I>(
        closed_at: NaiveDateTime,
        opening_balance: Money,
        final_balance: Money,
        declared_amount: Option<Money>,
        movements: I,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a MovementKind, Money)>,
    {
        let (total_entries, total_exits) = session_totals(movements);
        let declared_amount = declared_amount.unwrap_or(final_balance);

        CashClosingSummary {
            closed_at,
            opening_balance,
            total_entries,
            total_exits,
            final_balance,
            declared_amount,
            difference: declared_amount - final_balance,
        }
    }
}

// =============================================================================
// Balance Rules
// =============================================================================

/// Applies one movement to a balance.
///
/// ```rust
/// use pdv_core::money::Money;
/// use pdv_core::register::apply_movement;
/// use pdv_core::types::MovementKind;
///
/// let balance = Money::from_cents(10000);
/// let after = apply_movement(balance, &MovementKind::Outflow, Money::from_cents(500));
/// assert_eq!(after.cents(), 9500);
/// ```
pub fn apply_movement(balance: Money, kind: &MovementKind, amount: Money) -> Money {
    if kind.is_inflow() {
        balance + amount
    } else {
        balance - amount
    }
}

/// Sums entries and exits, ignoring the opening and closing records.
pub fn session_totals<'a, I>(movements: I) -> (Money, Money)
where
    I: IntoIterator<Item = (&'a MovementKind, Money)>,
{
    movements
        .into_iter()
        .filter(|(kind, _)| !kind.is_reserved())
        .fold((Money::zero(), Money::zero()), |(entries, exits), (kind, amount)| {
            if kind.is_inflow() {
                (entries + amount, exits)
            } else {
                (entries, exits + amount)
            }
        })
}

/// Checks a movement before it is written.
///
/// Opening and closing rows are left out of the session totals, so letting
/// callers write them would move the balance without moving the report.
pub fn ensure_can_record(kind: &MovementKind, amount: Money) -> CoreResult<()> {
    if kind.is_reserved() {
        return Err(CoreError::ReservedMovementKind(kind.to_string()));
    }
    validate_movement_amount(amount)?;
    Ok(())
}

/// Description of the closing movement.
pub fn closing_description(operator: Option<&str>) -> String {
    let operator = operator
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .unwrap_or(DEFAULT_CLOSING_OPERATOR);
    format!("{} - Operador: {}", CLOSING_DESCRIPTION, operator)
}

// =============================================================================
// Legacy State Inference
// =============================================================================

/// Infers the register state of a store written before the state was stored.
///
/// `descriptions` is the ledger newest-first. The first description that
/// mentions an opening or a closing decides. A positive balance on a non-empty
/// ledger always reads as open. An empty ledger reads as closed.
pub fn legacy_status<'a, I>(descriptions: I, balance: Money) -> RegisterState
where
    I: IntoIterator<Item = &'a str>,
{
    let opening = OPENING_DESCRIPTION.to_lowercase();
    let closing = CLOSING_DESCRIPTION.to_lowercase();

    let mut seen_any = false;
    let mut state = RegisterState::Closed;
    for description in descriptions {
        seen_any = true;
        let lowered = description.to_lowercase();
        if lowered.contains(&opening) {
            state = RegisterState::Open;
            break;
        }
        if lowered.contains(&closing) {
            break;
        }
    }

    if seen_any && state == RegisterState::Closed && balance.is_positive() {
        RegisterState::Open
    } else {
        state
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
