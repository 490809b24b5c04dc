//! Core types for the ad console.
//!
//! This module provides type-safe wrappers for the advertising domain.

pub mod account;
pub mod campaign;
pub mod capability;
pub mod email;
pub mod id;
pub mod page;
pub mod role;
pub mod user;
pub mod validation;

pub use account::{Account, AccountMember, AccountRecord, AccountUpdate, NewAccount};
pub use campaign::{
    AdCreative, AdCreativeInput, AdGroup, AdPlan, AdPlanInput, CreativeStatistics, PlanStatistics,
    PlanStatus, PriceStrategy, PromotionTarget,
};
pub use capability::{Capability, CapabilitySet, has_capability};
pub use email::{Email, EmailError};
pub use id::*;
pub use page::{Page, PageRequest, Pagination};
pub use role::{AccountRole, Role};
pub use user::{
    AccountBinding, ManagedUser, NewUser, ProfilePatch, UserAccount, UserPatch, UserProfile,
};
pub use validation::InputError;
