//! Scale normalization and derived-field computation.
//!
//! Converts extracted values to the canonical unit (millions of dollars) and
//! fills in fields that follow arithmetically from others. Normalization is
//! idempotent: once `metadata.normalized` is set the transformer is a no-op,
//! so running it twice never double-scales.

use crate::error::ExtractError;
use crate::scale::{detect_scale, Scale};
use crate::schema::{series_present, FinancialData, YearSeries};
use crate::SchemaError;

/// Detections below this confidence still convert, but leave a warning and a
/// quality flag behind.
const CONFIDENCE_WARN_THRESHOLD: f64 = 0.9;

/// A pipeline stage that rewrites `FinancialData` in place.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, data: &mut FinancialData, context: Option<&str>) -> Result<(), ExtractError>;
}

/// Detects the reporting scale from the revenue series, converts every
/// monetary series and scalar to millions, then fills derived fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleNormalizer;

impl Transformer for ScaleNormalizer {
    fn name(&self) -> &'static str {
        "scale_normalizer"
    }

    fn apply(&self, data: &mut FinancialData, context: Option<&str>) -> Result<(), ExtractError> {
        if data.metadata.normalized {
            return Ok(());
        }

        let revenue: Vec<f64> = data.income.revenue.iter().filter_map(|v| *v).collect();
        if revenue.is_empty() {
            return Err(SchemaError::RevenueMissing.into());
        }

        let detection = detect_scale(&revenue, context);
        convert_scale(data, detection.scale);
        data.metadata.record_conversion(format!(
            "detected scale {} (confidence {:.2}), converted to millions",
            detection.scale, detection.confidence
        ));

        if detection.confidence < CONFIDENCE_WARN_THRESHOLD {
            data.metadata.push_warning(format!(
                "scale detection is uncertain: {} at confidence {:.2}",
                detection.scale, detection.confidence
            ));
            data.metadata.push_quality_flag("low_confidence_scale");
        }

        data.metadata.normalized = true;
        fill_derived_fields(data);
        data.recompute_completeness();
        Ok(())
    }
}

/// Multiply every monetary series and scalar so values end up in millions.
/// Share counts and ratios are left untouched.
fn convert_scale(data: &mut FinancialData, scale: Scale) {
    let factor = scale.multiplier() / Scale::Millions.multiplier();
    if factor == 1.0 {
        return;
    }

    let series_groups = data
        .income
        .series_mut()
        .into_iter()
        .chain(data.balance.series_mut())
        .chain(data.cash_flow.series_mut());
    for (_, series) in series_groups {
        for value in series.iter_mut().flatten() {
            *value *= factor;
        }
    }

    for (_, scalar) in data.market.monetary_scalars_mut() {
        if let Some(value) = scalar {
            *value *= factor;
        }
    }
}

/// Fill fields that follow arithmetically from populated ones. A field is
/// only derived when it is currently absent; extracted values always win.
fn fill_derived_fields(data: &mut FinancialData) {
    let filled = derive_series(
        &data.income.revenue,
        &data.income.cogs,
        &mut data.income.gross_profit,
        |revenue, cogs| revenue - cogs,
    );
    if filled {
        data.metadata.record_derived_field("gross_profit");
    }

    let filled = derive_series(
        &data.income.ebitda,
        &data.income.depreciation_amortization,
        &mut data.income.ebit,
        |ebitda, depreciation| ebitda - depreciation,
    );
    if filled {
        data.metadata.record_derived_field("ebit");
    }

    // Capex sign conventions differ by source; FCF subtracts the magnitude.
    let filled = derive_series(
        &data.cash_flow.operating_cash_flow,
        &data.cash_flow.capital_expenditures,
        &mut data.cash_flow.free_cash_flow,
        |ocf, capex| ocf - capex.abs(),
    );
    if filled {
        data.metadata.record_derived_field("free_cash_flow");
    }

    let filled = derive_series(
        &data.balance.current_assets,
        &data.balance.current_liabilities,
        &mut data.balance.net_working_capital,
        |assets, liabilities| assets - liabilities,
    );
    if filled {
        data.metadata.record_derived_field("net_working_capital");
    }

    if data.market.net_debt.is_none() {
        if let (Some(debt), Some(cash)) = (data.market.total_debt, data.market.cash) {
            data.market.net_debt = Some(debt - cash);
            data.metadata.record_derived_field("net_debt");
        }
    }
    if data.market.enterprise_value.is_none() {
        if let (Some(market_cap), Some(net_debt)) = (data.market.market_cap, data.market.net_debt) {
            data.market.enterprise_value = Some(market_cap + net_debt);
            data.metadata.record_derived_field("enterprise_value");
        }
    }
}

/// Compute `target[i] = op(left[i], right[i])` for years where both operands
/// exist, but only when the target series is currently absent. Returns
/// whether anything was filled.
fn derive_series(
    left: &YearSeries,
    right: &YearSeries,
    target: &mut YearSeries,
    op: impl Fn(f64, f64) -> f64,
) -> bool {
    if series_present(target) || !series_present(left) || !series_present(right) {
        return false;
    }
    if left.len() != right.len() {
        return false;
    }

    let derived: YearSeries = left
        .iter()
        .zip(right)
        .map(|(l, r)| match (l, r) {
            (Some(l), Some(r)) => Some(op(*l, *r)),
            _ => None,
        })
        .collect();
    if derived.iter().all(Option::is_none) {
        return false;
    }

    *target = derived;
    true
}
