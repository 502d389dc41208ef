use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub String);

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingCycle {
    Monthly,
    Yearly,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(Self::Monthly),
            "yearly" => Some(Self::Yearly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub price: Decimal,
    pub billing_cycle: BillingCycle,
}

impl Plan {
    /// Price normalized to a monthly figure, regardless of billing cycle.
    pub fn monthly_price(&self) -> Decimal {
        match self.billing_cycle {
            BillingCycle::Monthly => self.price,
            BillingCycle::Yearly => self.price / Decimal::from(12),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{BillingCycle, Plan, PlanId};

    #[test]
    fn monthly_plan_price_is_unchanged() {
        let plan = Plan {
            id: PlanId("premium".to_string()),
            name: "Premium".to_string(),
            price: Decimal::new(2999, 2),
            billing_cycle: BillingCycle::Monthly,
        };
        assert_eq!(plan.monthly_price(), Decimal::new(2999, 2));
    }

    #[test]
    fn yearly_plan_price_is_divided_by_twelve() {
        let plan = Plan {
            id: PlanId("pro-annual".to_string()),
            name: "Pro Annual".to_string(),
            price: Decimal::from(120),
            billing_cycle: BillingCycle::Yearly,
        };
        assert_eq!(plan.monthly_price(), Decimal::from(10));
    }

    #[test]
    fn billing_cycle_round_trips_through_str() {
        assert_eq!(BillingCycle::parse("monthly"), Some(BillingCycle::Monthly));
        assert_eq!(BillingCycle::parse("yearly"), Some(BillingCycle::Yearly));
        assert_eq!(BillingCycle::parse("weekly"), None);
        assert_eq!(BillingCycle::Monthly.as_str(), "monthly");
    }
}
