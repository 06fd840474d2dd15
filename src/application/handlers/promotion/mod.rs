//! Promotion command and query handlers.

mod create_promo_code;
mod deactivate_promo_code;
mod list_promo_code_usages;
mod list_valid_promo_codes;
mod redeem_promo_code;
mod validate_promo_code;

// Commands
pub use create_promo_code::{CreatePromoCodeCommand, CreatePromoCodeHandler, DiscountInput};
pub use deactivate_promo_code::{DeactivatePromoCodeCommand, DeactivatePromoCodeHandler};
pub use redeem_promo_code::{RedeemPromoCodeCommand, RedeemPromoCodeHandler, RedeemPromoCodeResult};

// Queries
pub use list_promo_code_usages::{ListPromoCodeUsagesHandler, ListPromoCodeUsagesQuery};
pub use list_valid_promo_codes::{ListValidPromoCodesHandler, ListValidPromoCodesQuery};
pub use validate_promo_code::{ValidatePromoCodeHandler, ValidatePromoCodeQuery};
