//! # Validation Module
//!
//! Input validation for SnapDev PDV.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Presentation layer                                            │
//! │  └── Immediate operator feedback                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Repositories (pdv-db)                                         │
//! │  └── THIS MODULE: business rule validation before any write             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL constraints                                               │
//! │  ├── UNIQUE constraints (produtos.codigo, usuarios.usuario)             │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pdv_core::validation::{validate_product_code, validate_quantity};
//!
//! assert!(validate_product_code("7891000100103").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_CENTS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Minimum username length.
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 4;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product code.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - No whitespace (codes are scanned or typed as a single token)
///
/// ```rust
/// use pdv_core::validation::validate_product_code;
///
/// assert!(validate_product_code("CAM-001").is_ok());
/// assert!(validate_product_code("").is_err());
/// assert!(validate_product_code("CAM 001").is_err());
/// ```
pub fn validate_product_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: 50,
        });
    }

    if code.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a username.
///
/// ## Rules
/// - Letters and digits only
/// - At least [`MIN_USERNAME_LEN`] characters
///
/// ```rust
/// use pdv_core::validation::validate_username;
///
/// assert!(validate_username("maria").is_ok());
/// assert!(validate_username("jo").is_err());
/// assert!(validate_username("jo.silva").is_err());
/// ```
pub fn validate_username(username: &str) -> ValidationResult<()> {
    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if !username.chars().all(char::is_alphanumeric) {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters and numbers".to_string(),
        });
    }

    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: MIN_USERNAME_LEN,
        });
    }

    Ok(())
}

/// Validates a password. Only the length is checked.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level on a product record. Zero and above.
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    Ok(())
}

/// Validates a price. Zero is allowed (gifts, samples).
///
/// ```rust
/// use pdv_core::money::Money;
/// use pdv_core::validation::validate_price;
///
/// assert!(validate_price(Money::from_cents(0)).is_ok());
/// assert!(validate_price(Money::from_cents(-1)).is_err());
/// assert!(validate_price(Money::from_cents(i64::MAX)).is_err());
/// ```
pub fn validate_price(price: Money) -> ValidationResult<()> {
    validate_non_negative("price", price)
}

/// Validates an amount that must be non-negative (opening float, discount,
/// amount received). Capped at [`MAX_AMOUNT_CENTS`].
pub fn validate_non_negative(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }

    within_ceiling(field, amount)
}

fn within_ceiling(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT_CENTS,
        });
    }

    Ok(())
}

/// Validates a cash movement amount. Must be strictly positive; the kind
/// carries the direction.
pub fn validate_movement_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }

    within_ceiling("amount", amount)
}

// =============================================================================
// Unit Tests
// =============================================================================
