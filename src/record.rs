//! The application record: financial, estate and next-of-kin plans.
//!
//! Field names serialize in camelCase so exports stay interchangeable with
//! earlier versions of the planner. Missing fields fall back to their
//! defaults on deserialization, which keeps imports of older exports working.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};

/// Fixed id of the single application record.
pub const DEFAULT_RECORD_ID: &str = "default";

/// Current time in the RFC 3339 form used for every timestamp in a record.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub id: String,
    pub financial_plan: FinancialPlan,
    pub estate_plan: EstatePlan,
    pub next_of_kin_plan: NextOfKinPlan,
    pub created_at: String,
    pub updated_at: String,
}

impl AppData {
    /// A fresh record with every section at its defaults.
    pub fn new_default() -> Self {
        let now = timestamp();
        Self {
            id: DEFAULT_RECORD_ID.to_string(),
            financial_plan: FinancialPlan {
                last_updated: now.clone(),
                ..Default::default()
            },
            estate_plan: EstatePlan {
                last_updated: now.clone(),
                ..Default::default()
            },
            next_of_kin_plan: NextOfKinPlan {
                last_updated: now.clone(),
                ..Default::default()
            },
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Rejects amounts that are infinite or NaN. JSON has no representation
    /// for them, so a record holding one would not load again.
    pub fn validate(&self) -> Result<()> {
        let plan = &self.financial_plan;
        let mut amounts: Vec<(&str, f64)> = vec![
            ("emergency fund current", plan.emergency_fund.current),
            ("emergency fund target", plan.emergency_fund.target),
            ("retirement current savings", plan.retirement.current_savings),
            (
                "retirement estimated monthly income",
                plan.retirement.estimated_monthly_income,
            ),
            ("retirement target savings", plan.retirement.target_savings),
            ("retirement monthly savings goal", plan.retirement.monthly_savings_goal),
            (
                "retirement social security estimate",
                plan.retirement.social_security_estimate,
            ),
            ("estimated tax rate", plan.tax_info.estimated_tax_rate),
        ];
        amounts.extend(plan.income.iter().map(|i| ("income amount", i.amount)));
        amounts.extend(plan.expenses.iter().map(|e| ("expense amount", e.amount)));
        amounts.extend(plan.assets.iter().map(|a| ("asset value", a.value)));
        for liability in &plan.liabilities {
            amounts.push(("liability amount", liability.amount));
            amounts.extend(liability.interest_rate.map(|v| ("liability interest rate", v)));
            amounts.extend(liability.monthly_payment.map(|v| ("liability monthly payment", v)));
        }
        for goal in &plan.savings_goals {
            amounts.push(("savings goal target amount", goal.target_amount));
            amounts.push(("savings goal current amount", goal.current_amount));
            amounts.push(("savings goal monthly contribution", goal.monthly_contribution));
        }
        for policy in &plan.insurance {
            amounts.push(("insurance coverage", policy.coverage));
            amounts.push(("insurance premium", policy.premium));
        }

        let estate = &self.estate_plan;
        let beneficiaries = estate.trust.beneficiaries.iter().chain(
            estate
                .beneficiary_designations
                .iter()
                .flat_map(|d| d.primary_beneficiaries.iter().chain(&d.contingent_beneficiaries)),
        );
        amounts.extend(
            beneficiaries.filter_map(|b| b.percentage.map(|v| ("beneficiary percentage", v))),
        );

        match amounts.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, value)) => Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::InvalidRecord,
                format!("{} must be a finite number, got {}", field, value),
            )),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub name: String,
    pub age: u32,
    pub date_of_birth: String,
    pub contact_info: ContactInfo,
    pub short_term_goals: String,
    pub mid_term_goals: String,
    pub long_term_goals: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Monthly,
    Annual,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseType {
    #[default]
    Fixed,
    Variable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: String,
    pub name: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: ExpenseType,
    pub frequency: Frequency,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Savings,
    Investment,
    Property,
    Retirement,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AssetType,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityType {
    Loan,
    CreditCard,
    Mortgage,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Liability {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: LiabilityType,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: String,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: String,
    pub monthly_contribution: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceType {
    Life,
    Health,
    Disability,
    Property,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsurancePolicy {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InsuranceType,
    pub provider: String,
    pub policy_number: String,
    pub coverage: f64,
    pub premium: f64,
    pub expiry_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmergencyFund {
    pub current: f64,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetirementPlan {
    pub current_savings: f64,
    pub estimated_retirement_age: u32,
    pub estimated_monthly_income: f64,
    pub target_savings: f64,
    pub monthly_savings_goal: f64,
    pub pension_plans: String,
    pub social_security_estimate: f64,
}

impl Default for RetirementPlan {
    fn default() -> Self {
        Self {
            current_savings: 0.0,
            estimated_retirement_age: 65,
            estimated_monthly_income: 0.0,
            target_savings: 0.0,
            monthly_savings_goal: 0.0,
            pension_plans: String::new(),
            social_security_estimate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaxInfo {
    pub filing_status: String,
    pub current_strategies: String,
    pub deductions: String,
    pub estimated_tax_rate: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewSchedule {
    Monthly,
    #[default]
    Quarterly,
    Annually,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialPlan {
    pub personal_info: PersonalInfo,
    pub income: Vec<IncomeSource>,
    pub expenses: Vec<Expense>,
    pub assets: Vec<Asset>,
    pub liabilities: Vec<Liability>,
    pub savings_goals: Vec<SavingsGoal>,
    pub insurance: Vec<InsurancePolicy>,
    pub emergency_fund: EmergencyFund,
    pub retirement: RetirementPlan,
    pub tax_info: TaxInfo,
    pub action_plan: String,
    pub review_schedule: ReviewSchedule,
    pub last_updated: String,
}

impl FinancialPlan {
    pub fn total_assets(&self) -> f64 {
        self.assets.iter().map(|a| a.value).sum()
    }

    pub fn total_liabilities(&self) -> f64 {
        self.liabilities.iter().map(|l| l.amount).sum()
    }

    pub fn net_worth(&self) -> f64 {
        self.total_assets() - self.total_liabilities()
    }
}

/// Name and contact details of someone acting for the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Representative {
    pub name: String,
    pub relationship: String,
    pub contact_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beneficiary {
    pub id: String,
    pub name: String,
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Will {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub executor: Representative,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guardian_for_minors: Option<Representative>,
    pub asset_distribution: String,
    pub special_instructions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustType {
    Revocable,
    Irrevocable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trust {
    pub exists: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<TrustType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    pub trustee: Representative,
    pub beneficiaries: Vec<Beneficiary>,
    pub assets: String,
    pub terms: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentDesignation {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<Representative>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DigitalAssets {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PowerOfAttorney {
    pub financial: AgentDesignation,
    pub healthcare: AgentDesignation,
    pub digital_assets: DigitalAssets,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeSustaining {
    Yes,
    No,
    #[default]
    Conditional,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganDonation {
    Yes,
    #[default]
    No,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivingWill {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<String>,
    pub life_sustaining: LifeSustaining,
    pub organ_donation: OrganDonation,
    pub preferences: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dnr {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthcareDirectives {
    pub living_will: LivingWill,
    pub dnr: Dnr,
    pub advance_directives: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    LifeInsurance,
    Retirement,
    Investment,
    Bank,
    #[default]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryDesignation {
    pub id: String,
    pub account_type: AccountType,
    pub account_name: String,
    pub institution: String,
    pub account_number: String,
    #[serde(default)]
    pub primary_beneficiaries: Vec<Beneficiary>,
    #[serde(default)]
    pub contingent_beneficiaries: Vec<Beneficiary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LetterOfIntent {
    pub funeral_wishes: String,
    pub burial_preferences: String,
    pub personal_item_distribution: String,
    pub special_instructions: String,
    pub messages: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalCareNeeds {
    pub daily_living_assistance: String,
    pub medical_equipment: String,
    pub home_modifications: String,
    pub caregiver_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegalAdvocacy {
    pub guardianship_info: String,
    pub disability_benefits: String,
    pub legal_protections: String,
    pub advocate_info: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityOfLife {
    pub transportation_needs: String,
    pub mobility_aids: String,
    pub home_accessibility: String,
    pub community_resources: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstatePlan {
    pub will: Will,
    pub trust: Trust,
    pub power_of_attorney: PowerOfAttorney,
    pub healthcare_directives: HealthcareDirectives,
    pub beneficiary_designations: Vec<BeneficiaryDesignation>,
    pub letter_of_intent: LetterOfIntent,
    pub personal_care_needs: PersonalCareNeeds,
    pub legal_advocacy: LegalAdvocacy,
    pub quality_of_life: QualityOfLife,
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// One thing the next of kin has to do, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub id: String,
    pub order: u32,
    pub title: String,
    pub description: String,
    pub organization: String,
    #[serde(default)]
    pub contact_info: StepContact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NextOfKinPlan {
    pub action_steps: Vec<ActionStep>,
    pub last_updated: String,
}

impl NextOfKinPlan {
    /// Action steps sorted by their `order` field.
    pub fn ordered_steps(&self) -> Vec<&ActionStep> {
        let mut steps: Vec<&ActionStep> = self.action_steps.iter().collect();
        steps.sort_by_key(|s| s.order);
        steps
    }
}
