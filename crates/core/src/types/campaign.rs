//! Campaign records: ad plans, ad groups and ad creatives.
//!
//! Field names follow the backend's JSON. Two of them are historical
//! misnomers kept on the wire only: `price_stratagy` and
//! `chuang_yi_you_xuan` (creative optimization, sent as `"1"`/`"0"`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{AdCreativeId, AdGroupId, AdPlanId};
use super::validation::{InputError, at_least, required_text};

/// Maximum length of a plan, group or creative name.
pub const MAX_NAME_LENGTH: usize = 50;

/// Smallest budget a plan may be created with.
pub const MIN_PLAN_BUDGET: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

// =============================================================================
// Enumerations
// =============================================================================

/// What a plan promotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PromotionTarget {
    #[default]
    App,
    Web,
    QuickApp,
    MiniApp,
    Download,
}

impl PromotionTarget {
    pub const ALL: [Self; 5] = [
        Self::App,
        Self::Web,
        Self::QuickApp,
        Self::MiniApp,
        Self::Download,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Web => "web",
            Self::QuickApp => "quick_app",
            Self::MiniApp => "mini_app",
            Self::Download => "download",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::App => "App promotion",
            Self::Web => "Web promotion",
            Self::QuickApp => "Quick app promotion",
            Self::MiniApp => "Mini program promotion",
            Self::Download => "App download",
        }
    }
}

impl std::str::FromStr for PromotionTarget {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| InputError::Invalid(format!("unknown promotion target: {s}")))
    }
}

/// Bidding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriceStrategy {
    #[default]
    StableCost,
    MaxConversion,
    OptimalCost,
}

impl PriceStrategy {
    pub const ALL: [Self; 3] = [Self::StableCost, Self::MaxConversion, Self::OptimalCost];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StableCost => "stable_cost",
            Self::MaxConversion => "max_conversion",
            Self::OptimalCost => "optimal_cost",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::StableCost => "Stable cost",
            Self::MaxConversion => "Max conversion",
            Self::OptimalCost => "Optimal cost",
        }
    }
}

impl std::str::FromStr for PriceStrategy {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| InputError::Invalid(format!("unknown price strategy: {s}")))
    }
}

/// Delivery status of a plan. Numeric on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum PlanStatus {
    #[default]
    Draft,
    Published,
    Paused,
    Ended,
}

impl PlanStatus {
    pub const ALL: [Self; 4] = [Self::Draft, Self::Published, Self::Paused, Self::Ended];

    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Published => 1,
            Self::Paused => 2,
            Self::Ended => 3,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Published => "Published",
            Self::Paused => "Paused",
            Self::Ended => "Ended",
        }
    }
}

impl TryFrom<u8> for PlanStatus {
    type Error = InputError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Draft),
            1 => Ok(Self::Published),
            2 => Ok(Self::Paused),
            3 => Ok(Self::Ended),
            other => Err(InputError::Invalid(format!("unknown plan status: {other}"))),
        }
    }
}

impl From<PlanStatus> for u8 {
    fn from(status: PlanStatus) -> Self {
        status.code()
    }
}

/// Lenient boolean decoding: the backend has sent `true`, `1` and `"1"` for
/// the same field over time.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Int(n) => n != 0,
            Raw::Text(s) => matches!(s.as_str(), "1" | "true"),
        })
    }

    /// `"1"` / `"0"`.
    pub mod digit {
        use super::Serializer;

        pub use super::deserialize;

        #[allow(clippy::trivially_copy_pass_by_ref)]
        pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(if *value { "1" } else { "0" })
        }
    }
}

// =============================================================================
// Ad plans
// =============================================================================

/// An ad plan with its delivery statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdPlan {
    pub id: AdPlanId,
    pub name: String,
    #[serde(default)]
    pub plan_type: String,
    #[serde(default)]
    pub target: PromotionTarget,
    #[serde(default, rename = "price_stratagy")]
    pub price_strategy: PriceStrategy,
    #[serde(default)]
    pub placement_type: String,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default, rename = "chuang_yi_you_xuan", with = "flag::digit")]
    pub creative_optimization: bool,
    #[serde(default)]
    pub budget: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub display_count: i64,
    #[serde(default)]
    pub click_count: i64,
    #[serde(default)]
    pub download_count: i64,
    #[serde(default)]
    pub click_per_price: Decimal,
    #[serde(default)]
    pub click_rate: f64,
    #[serde(default)]
    pub ecpm: Decimal,
    #[serde(default)]
    pub download_per_count: Decimal,
    #[serde(default)]
    pub download_rate: f64,
}

impl AdPlan {
    /// Merge an accepted update into the local copy.
    pub fn apply_input(&mut self, input: &AdPlanInput) {
        self.name.clone_from(&input.name);
        self.plan_type.clone_from(&input.plan_type);
        self.target = input.target;
        self.price_strategy = input.price_strategy;
        self.placement_type.clone_from(&input.placement_type);
        self.status = input.status;
        self.creative_optimization = input.creative_optimization;
        self.budget = input.budget;

        let stats = &input.statistics;
        if let Some(v) = stats.cost {
            self.cost = v;
        }
        if let Some(v) = stats.display_count {
            self.display_count = v;
        }
        if let Some(v) = stats.click_count {
            self.click_count = v;
        }
        if let Some(v) = stats.download_count {
            self.download_count = v;
        }
        if let Some(v) = stats.click_per_price {
            self.click_per_price = v;
        }
        if let Some(v) = stats.click_rate {
            self.click_rate = v;
        }
        if let Some(v) = stats.ecpm {
            self.ecpm = v;
        }
        if let Some(v) = stats.download_per_count {
            self.download_per_count = v;
        }
        if let Some(v) = stats.download_rate {
            self.download_rate = v;
        }
    }
}

/// Statistic columns an operator may override. Only holders of the
/// edit-statistics capability send them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_per_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecpm: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_per_count: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_rate: Option<f64>,
}

/// Body of ad plan create/update requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdPlanInput {
    pub name: String,
    pub plan_type: String,
    pub target: PromotionTarget,
    #[serde(rename = "price_stratagy")]
    pub price_strategy: PriceStrategy,
    pub placement_type: String,
    pub status: PlanStatus,
    #[serde(rename = "chuang_yi_you_xuan", with = "flag::digit")]
    pub creative_optimization: bool,
    pub budget: Decimal,
    #[serde(flatten)]
    pub statistics: PlanStatistics,
}

impl AdPlanInput {
    /// Apply the plan form rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule the input breaks.
    pub fn validate(&self) -> Result<(), InputError> {
        required_text("name", &self.name, MAX_NAME_LENGTH)?;
        required_text("plan type", &self.plan_type, MAX_NAME_LENGTH)?;
        required_text("placement type", &self.placement_type, MAX_NAME_LENGTH)?;
        at_least("budget", self.budget, MIN_PLAN_BUDGET)
    }

    /// Build the record the backend would return for this input, for local
    /// display when the create response omits fields.
    #[must_use]
    pub fn into_plan(self, id: AdPlanId) -> AdPlan {
        let mut plan = AdPlan {
            id,
            name: String::new(),
            plan_type: String::new(),
            target: self.target,
            price_strategy: self.price_strategy,
            placement_type: String::new(),
            status: self.status,
            creative_optimization: self.creative_optimization,
            budget: self.budget,
            cost: Decimal::ZERO,
            display_count: 0,
            click_count: 0,
            download_count: 0,
            click_per_price: Decimal::ZERO,
            click_rate: 0.0,
            ecpm: Decimal::ZERO,
            download_per_count: Decimal::ZERO,
            download_rate: 0.0,
        };
        plan.apply_input(&self);
        plan
    }
}

// =============================================================================
// Ad groups
// =============================================================================

/// A named group of ad plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdGroup {
    pub id: AdGroupId,
    pub name: String,
    #[serde(default)]
    pub ad_plans: Vec<AdPlan>,
}

impl AdGroup {
    /// Number of plans bound to the group. A group with dependents cannot be
    /// deleted.
    #[must_use]
    pub fn dependents(&self) -> usize {
        self.ad_plans.len()
    }

    /// Append plans not already bound. Returns how many were added.
    pub fn bind_plans(&mut self, plans: impl IntoIterator<Item = AdPlan>) -> usize {
        let mut added = 0;
        for plan in plans {
            if self.ad_plans.iter().all(|p| p.id != plan.id) {
                self.ad_plans.push(plan);
                added += 1;
            }
        }
        added
    }

    /// Remove a bound plan. Returns whether it was present.
    pub fn unbind_plan(&mut self, plan_id: AdPlanId) -> bool {
        let before = self.ad_plans.len();
        self.ad_plans.retain(|p| p.id != plan_id);
        self.ad_plans.len() != before
    }
}

// =============================================================================
// Ad creatives
// =============================================================================

/// An ad creative with its delivery statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCreative {
    pub id: AdCreativeId,
    pub name: String,
    #[serde(default)]
    pub display_id: Option<String>,
    /// On/off switch.
    #[serde(default, deserialize_with = "flag::deserialize")]
    pub status: bool,
    #[serde(default)]
    pub budget: Decimal,
    #[serde(default)]
    pub download_cost: Decimal,
    #[serde(default)]
    pub click_cost: Decimal,
    #[serde(default)]
    pub costs: Decimal,
    #[serde(default)]
    pub download_count: i64,
    #[serde(default)]
    pub download_rate: f64,
    #[serde(default)]
    pub ecpm: Decimal,
    #[serde(default)]
    pub display_count: i64,
    #[serde(default)]
    pub click_count: i64,
    #[serde(default)]
    pub click_rate: f64,
}

impl AdCreative {
    /// Merge an accepted update into the local copy.
    pub fn apply_input(&mut self, input: &AdCreativeInput) {
        self.name.clone_from(&input.name);
        self.display_id.clone_from(&input.display_id);
        self.status = input.status;
        self.budget = input.budget;

        let stats = &input.statistics;
        if let Some(v) = stats.download_cost {
            self.download_cost = v;
        }
        if let Some(v) = stats.click_cost {
            self.click_cost = v;
        }
        if let Some(v) = stats.costs {
            self.costs = v;
        }
        if let Some(v) = stats.download_count {
            self.download_count = v;
        }
        if let Some(v) = stats.download_rate {
            self.download_rate = v;
        }
        if let Some(v) = stats.ecpm {
            self.ecpm = v;
        }
        if let Some(v) = stats.display_count {
            self.display_count = v;
        }
        if let Some(v) = stats.click_count {
            self.click_count = v;
        }
        if let Some(v) = stats.click_rate {
            self.click_rate = v;
        }
    }
}

/// Creative statistic overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeStatistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecpm: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_rate: Option<f64>,
}

/// Body of ad creative create/update requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdCreativeInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub status: bool,
    pub budget: Decimal,
    #[serde(flatten)]
    pub statistics: CreativeStatistics,
}

impl AdCreativeInput {
    /// Apply the creative form rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule the input breaks.
    pub fn validate(&self) -> Result<(), InputError> {
        required_text("name", &self.name, MAX_NAME_LENGTH)?;
        at_least("budget", self.budget, Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_json() -> serde_json::Value {
        serde_json::json!({
            "id": 3,
            "name": "Spring sale",
            "plan_type": "search",
            "target": "quick_app",
            "price_stratagy": "max_conversion",
            "placement_type": "auto",
            "status": 2,
            "chuang_yi_you_xuan": "1",
            "budget": "5000",
            "cost": 12.5,
            "display_count": 1000,
            "click_count": 50,
            "click_rate": 5.0
        })
    }

    fn input() -> AdPlanInput {
        AdPlanInput {
            name: "Plan".into(),
            plan_type: "search".into(),
            target: PromotionTarget::Web,
            price_strategy: PriceStrategy::OptimalCost,
            placement_type: "manual".into(),
            status: PlanStatus::Published,
            creative_optimization: false,
            budget: Decimal::from(500),
            statistics: PlanStatistics::default(),
        }
    }

    #[test]
    fn test_plan_decodes_wire_names() {
        let plan: AdPlan = serde_json::from_value(plan_json()).expect("deserialize");
        assert_eq!(plan.id, AdPlanId::new(3));
        assert_eq!(plan.target, PromotionTarget::QuickApp);
        assert_eq!(plan.price_strategy, PriceStrategy::MaxConversion);
        assert_eq!(plan.status, PlanStatus::Paused);
        assert!(plan.creative_optimization);
        assert_eq!(plan.download_count, 0);
    }

    #[test]
    fn test_plan_encodes_wire_names() {
        let value = serde_json::to_value(input()).expect("serialize");
        assert_eq!(value["price_stratagy"], "optimal_cost");
        assert_eq!(value["chuang_yi_you_xuan"], "0");
        assert_eq!(value["status"], 1);
        assert!(value.get("cost").is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let mut json = plan_json();
        json["status"] = serde_json::json!(9);
        assert!(serde_json::from_value::<AdPlan>(json).is_err());
    }

    #[test]
    fn test_plan_validation() {
        assert!(input().validate().is_ok());

        let mut low = input();
        low.budget = Decimal::from(99);
        assert!(matches!(low.validate(), Err(InputError::BelowMinimum { .. })));

        let mut unnamed = input();
        unnamed.name = "  ".into();
        assert_eq!(unnamed.validate(), Err(InputError::Required { field: "name" }));
    }

    #[test]
    fn test_apply_input_keeps_statistics_without_overrides() {
        let mut plan: AdPlan = serde_json::from_value(plan_json()).expect("deserialize");
        plan.apply_input(&input());
        assert_eq!(plan.name, "Plan");
        assert_eq!(plan.display_count, 1000);

        let mut with_stats = input();
        with_stats.statistics.display_count = Some(5);
        plan.apply_input(&with_stats);
        assert_eq!(plan.display_count, 5);
    }

    #[test]
    fn test_group_bind_and_unbind() {
        let plan: AdPlan = serde_json::from_value(plan_json()).expect("deserialize");
        let mut group = AdGroup {
            id: AdGroupId::new(1),
            name: "G".into(),
            ad_plans: vec![],
        };
        assert_eq!(group.bind_plans([plan.clone(), plan.clone()]), 1);
        assert_eq!(group.dependents(), 1);
        assert!(group.unbind_plan(plan.id));
        assert!(!group.unbind_plan(plan.id));
    }

    #[test]
    fn test_creative_status_accepts_numeric_flag() {
        let creative: AdCreative =
            serde_json::from_value(serde_json::json!({"id": 1, "name": "C", "status": 1}))
                .expect("deserialize");
        assert!(creative.status);
    }
}
