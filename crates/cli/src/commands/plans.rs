//! Ad plan listing.

use ad_console::filters::format_money;
use ad_console_core::{AdPlan, PageRequest};

use super::{CliError, Context};

/// Print one page of the selected account's ad plans.
///
/// # Errors
///
/// [`CliError::NoAccount`] without a selected account, or the backend
/// error.
pub async fn list(
    ctx: &Context,
    page: u32,
    page_size: u32,
    name: Option<&str>,
) -> Result<(), CliError> {
    let state = ctx.logged_in()?;
    let account = state.current_account_id().ok_or(CliError::NoAccount)?;

    let query = PageRequest::new(page, page_size, name);
    let result = ctx.backend().list_ad_plans(&query, Some(account)).await;
    let plans = ctx.checked(result).await?;

    if plans.items.is_empty() {
        println!("No ad plans");
        return Ok(());
    }
    for plan in &plans.items {
        println!("{}", row(plan));
    }
    println!(
        "Page {} of {} ({} total)",
        query.page(),
        plans.total_pages(query.page_size()),
        plans.total
    );
    Ok(())
}

fn row(plan: &AdPlan) -> String {
    format!(
        "{:>6}  {:<32} {:<10} {:>12} {:>12}",
        plan.id.as_i64(),
        plan.name,
        plan.status.label(),
        format_money(plan.budget),
        format_money(plan.cost),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ad_console_core::{AdPlanId, PlanStatus, PriceStrategy, PromotionTarget};
    use rust_decimal::Decimal;

    #[test]
    fn test_row_formats_amounts() {
        let plan = AdPlan {
            id: AdPlanId::new(7),
            name: "Spring".into(),
            plan_type: "cpc".into(),
            target: PromotionTarget::default(),
            price_strategy: PriceStrategy::default(),
            placement_type: "feed".into(),
            status: PlanStatus::Published,
            creative_optimization: false,
            budget: Decimal::from(1500),
            cost: Decimal::new(2550, 2),
            display_count: 0,
            click_count: 0,
            download_count: 0,
            click_per_price: Decimal::ZERO,
            click_rate: 0.0,
            ecpm: Decimal::ZERO,
            download_per_count: Decimal::ZERO,
            download_rate: 0.0,
        };
        let row = row(&plan);
        assert!(row.contains("Spring"));
        assert!(row.contains("1,500.00"));
        assert!(row.contains("25.50"));
        assert!(row.starts_with("     7"));
    }
}
