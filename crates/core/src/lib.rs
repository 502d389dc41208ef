pub mod admission;
pub mod config;
pub mod domain;
pub mod errors;
pub mod intent;
pub mod recommend;

pub use admission::{AdmissionDecision, AdmissionGate};
pub use domain::billing::{BillingRecord, BillingStatus};
pub use domain::customer::{Customer, CustomerId};
pub use domain::plan::{BillingCycle, Plan, PlanId};
pub use domain::subscription::{Subscription, SubscriptionId, SubscriptionStatus};
pub use errors::ChatError;
pub use intent::{ActionIntent, ChatAction, ConversationTurn, TurnRole};
pub use recommend::{CostImplication, Recommendation};

pub use chrono;
