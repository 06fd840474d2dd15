//! Redemption Engine - discount and referral code redemption for course purchases
//!
//! Validates and redeems promo codes under concurrent load, and runs the
//! referral program from invitation through conversion to reward.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
