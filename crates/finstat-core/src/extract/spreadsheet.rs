//! Layout-inference extractor for spreadsheets with unknown layouts.
//!
//! No hardcoded cell coordinates: the extractor finds a run of calendar
//! years, infers whether the sheet is row- or column-oriented, fuzzy-matches
//! labels on the perpendicular axis, and reads the aligned numeric runs.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ExtractError;
use crate::extract::grid::{load_workbook, Cell, Sheet};
use crate::extract::{ExtractFuture, ExtractOptions, Extractor, Source};
use crate::fuzzy::LabelMatcher;
use crate::schema::{
    BalanceSheet, CashFlowStatement, CompanyInfo, ExtractionMetadata, FinancialData,
    IncomeStatement, MarketData, YearSeries,
};

const YEAR_MIN: i32 = 1990;
const YEAR_MAX: i32 = 2050;
/// Maximum gap between consecutive years inside one run.
const MAX_YEAR_GAP: i32 = 5;
const MIN_RUN_LEN: usize = 2;

/// Search window for the year run.
const SCAN_ROWS: usize = 30;
const SCAN_COLS: usize = 40;

/// "Looks financial" heuristic for sheets whose names say nothing.
const LOOKS_FINANCIAL_ROWS: usize = 50;
const MIN_YEAR_HITS: usize = 2;
const MIN_KEYWORD_HITS: usize = 3;

const ACCEPT_SHEET_NAMES: [&str; 8] = [
    "income",
    "profit",
    "p&l",
    "balance",
    "cash flow",
    "cashflow",
    "financial",
    "statement",
];
const REJECT_SHEET_NAMES: [&str; 5] = ["assumption", "cover", "note", "instruction", "contents"];
const FINANCIAL_KEYWORDS: [&str; 10] = [
    "revenue",
    "sales",
    "income",
    "assets",
    "liabilities",
    "equity",
    "cash",
    "ebitda",
    "expenses",
    "depreciation",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    /// Years run left-to-right in one row; fields are rows below it.
    Rows,
    /// Years run top-to-bottom in one column; fields are columns beside it.
    Columns,
}

/// A located run of fiscal years with the grid positions of each year.
#[derive(Debug, Clone)]
struct YearRun {
    orientation: Orientation,
    /// Row index (Rows) or column index (Columns) holding the run.
    axis: usize,
    years: Vec<i32>,
    /// Column indices (Rows) or row indices (Columns), aligned with `years`.
    positions: Vec<usize>,
}

/// Extractor for spreadsheet sources.
pub struct SpreadsheetExtractor {
    matcher: LabelMatcher,
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self {
            matcher: LabelMatcher::default(),
        }
    }
}

impl Extractor for SpreadsheetExtractor {
    fn id(&self) -> &'static str {
        "spreadsheet"
    }

    fn can_handle(&self, source: &Source) -> bool {
        matches!(source, Source::Spreadsheet(_))
    }

    fn extract<'a>(&'a self, source: &'a Source, options: &'a ExtractOptions) -> ExtractFuture<'a> {
        Box::pin(async move {
            let Source::Spreadsheet(path) = source else {
                return Err(ExtractError::invalid_source(
                    "spreadsheet extractor received a non-spreadsheet source",
                ));
            };
            self.extract_from_path(path, options)
        })
    }
}

impl SpreadsheetExtractor {
    fn extract_from_path(
        &self,
        path: &Path,
        options: &ExtractOptions,
    ) -> Result<FinancialData, ExtractError> {
        let sheets = load_workbook(path)?;
        let qualifying: Vec<&Sheet> = sheets.iter().filter(|s| sheet_qualifies(s)).collect();
        if qualifying.is_empty() {
            return Err(ExtractError::unavailable(format!(
                "no financial statement sheet found in '{}'",
                path.display()
            )));
        }

        let mut years: Option<Vec<i32>> = None;
        let mut fields: BTreeMap<&'static str, YearSeries> = BTreeMap::new();
        let mut metadata = ExtractionMetadata::new("spreadsheet")
            .with_source_path(path.display().to_string());

        for sheet in &qualifying {
            let Some(run) = find_year_run(sheet) else {
                metadata.push_warning(format!(
                    "sheet '{}' has no recognizable year layout",
                    sheet.name
                ));
                continue;
            };

            let canonical = years.get_or_insert_with(|| run.years.clone());
            let extracted = self.extract_fields(sheet, &run);
            merge_fields(&mut fields, canonical, &run.years, extracted);
        }

        let Some(mut years) = years else {
            return Err(ExtractError::unavailable(format!(
                "no year row or column found in any sheet of '{}'",
                path.display()
            )));
        };

        if let Some(limit) = options.years {
            truncate_to_recent(&mut years, &mut fields, limit);
        }

        let mut income = IncomeStatement::default();
        let mut balance = BalanceSheet::default();
        let mut cash_flow = CashFlowStatement::default();
        for (field, series) in fields {
            assign_field(field, series, &mut income, &mut balance, &mut cash_flow);
        }

        let company = CompanyInfo::new(company_name_from_path(path))?;
        let data = FinancialData::new(
            company,
            years,
            income,
            balance,
            cash_flow,
            MarketData::default(),
            metadata,
        )?;
        Ok(data)
    }

    /// Walk the axis perpendicular to the year run, fuzzy-matching labels and
    /// reading the aligned numeric runs.
    fn extract_fields(&self, sheet: &Sheet, run: &YearRun) -> Vec<(&'static str, f64, YearSeries)> {
        let mut extracted: Vec<(&'static str, f64, YearSeries)> = Vec::new();

        match run.orientation {
            Orientation::Rows => {
                // Labels sit left of the leftmost year cell; positions are in
                // year order, not grid order.
                let label_limit = run.positions.iter().copied().min().unwrap_or(1);
                for (row_idx, _) in sheet.rows.iter().enumerate().skip(run.axis + 1) {
                    let label = (0..label_limit.max(1))
                        .find_map(|col| sheet.cell(row_idx, col).as_text());
                    let Some(label) = label else { continue };
                    let Some(matched) = self.matcher.best_match(label) else {
                        continue;
                    };

                    let series: YearSeries = run
                        .positions
                        .iter()
                        .map(|&col| sheet.cell(row_idx, col).as_number())
                        .collect();
                    push_best(&mut extracted, matched.field, matched.score, series);
                }
            }
            Orientation::Columns => {
                let first_year_row = run.positions.iter().copied().min().unwrap_or(0);
                let Some(header_row) = first_year_row.checked_sub(1) else {
                    return extracted;
                };
                let width = sheet.rows.iter().map(Vec::len).max().unwrap_or(0);
                for col in (0..width).filter(|&c| c != run.axis) {
                    let Some(label) = sheet.cell(header_row, col).as_text() else {
                        continue;
                    };
                    let Some(matched) = self.matcher.best_match(label) else {
                        continue;
                    };

                    let series: YearSeries = run
                        .positions
                        .iter()
                        .map(|&row| sheet.cell(row, col).as_number())
                        .collect();
                    push_best(&mut extracted, matched.field, matched.score, series);
                }
            }
        }

        extracted
    }
}

/// Keep only the best-scoring occurrence of each field within one sheet.
fn push_best(
    extracted: &mut Vec<(&'static str, f64, YearSeries)>,
    field: &'static str,
    score: f64,
    series: YearSeries,
) {
    if series.iter().all(Option::is_none) {
        return;
    }

    match extracted.iter_mut().find(|(name, _, _)| *name == field) {
        Some(existing) if score > existing.1 => *existing = (field, score, series),
        Some(_) => {}
        None => extracted.push((field, score, series)),
    }
}

/// Merge one sheet's extractions into the accumulated field map, aligning by
/// fiscal year and preferring values that are already present.
fn merge_fields(
    fields: &mut BTreeMap<&'static str, YearSeries>,
    canonical_years: &[i32],
    sheet_years: &[i32],
    extracted: Vec<(&'static str, f64, YearSeries)>,
) {
    for (field, _, series) in extracted {
        let slot = fields
            .entry(field)
            .or_insert_with(|| vec![None; canonical_years.len()]);
        for (value, year) in series.iter().zip(sheet_years) {
            let Some(idx) = canonical_years.iter().position(|y| y == year) else {
                continue;
            };
            if slot[idx].is_none() {
                slot[idx] = *value;
            }
        }
    }
}

fn truncate_to_recent(
    years: &mut Vec<i32>,
    fields: &mut BTreeMap<&'static str, YearSeries>,
    limit: usize,
) {
    if limit == 0 || years.len() <= limit {
        return;
    }
    let drop = years.len() - limit;
    years.drain(..drop);
    for series in fields.values_mut() {
        series.drain(..drop);
    }
}

fn assign_field(
    field: &'static str,
    series: YearSeries,
    income: &mut IncomeStatement,
    balance: &mut BalanceSheet,
    cash_flow: &mut CashFlowStatement,
) {
    match field {
        "revenue" => income.revenue = series,
        "cogs" => income.cogs = series,
        "gross_profit" => income.gross_profit = series,
        "operating_expenses" => income.operating_expenses = series,
        "ebitda" => income.ebitda = series,
        "depreciation_amortization" => income.depreciation_amortization = series,
        "ebit" => income.ebit = series,
        "interest_expense" => income.interest_expense = series,
        "tax_expense" => income.tax_expense = series,
        "net_income" => income.net_income = series,
        "total_assets" => balance.total_assets = series,
        "current_assets" => balance.current_assets = series,
        "cash_and_equivalents" => balance.cash_and_equivalents = series,
        "total_liabilities" => balance.total_liabilities = series,
        "current_liabilities" => balance.current_liabilities = series,
        "total_debt" => balance.total_debt = series,
        "total_equity" => balance.total_equity = series,
        "operating_cash_flow" => cash_flow.operating_cash_flow = series,
        "capital_expenditures" => cash_flow.capital_expenditures = series,
        "free_cash_flow" => cash_flow.free_cash_flow = series,
        "beginning_cash" => cash_flow.beginning_cash = series,
        "net_change_in_cash" => cash_flow.net_change_in_cash = series,
        "ending_cash" => cash_flow.ending_cash = series,
        _ => {}
    }
}

fn company_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("Unknown Company");
    let cleaned = stem.replace(['_', '-'], " ").trim().to_owned();
    if cleaned.is_empty() {
        String::from("Unknown Company")
    } else {
        cleaned
    }
}

/// Accept a sheet by name keyword, or fall back to a content scan.
fn sheet_qualifies(sheet: &Sheet) -> bool {
    let name = sheet.name.to_lowercase();
    if REJECT_SHEET_NAMES.iter().any(|kw| name.contains(kw)) {
        return false;
    }
    if ACCEPT_SHEET_NAMES.iter().any(|kw| name.contains(kw)) {
        return true;
    }
    looks_financial(sheet)
}

/// A sheet "looks financial" when its first rows contain at least two
/// year-like numbers and at least three financial keyword hits.
fn looks_financial(sheet: &Sheet) -> bool {
    let mut year_hits = 0;
    let mut keyword_hits = 0;

    for row in sheet.rows.iter().take(LOOKS_FINANCIAL_ROWS) {
        for cell in row {
            if cell_year(cell).is_some() {
                year_hits += 1;
            }
            if let Some(text) = cell.as_text() {
                let lowered = text.to_lowercase();
                keyword_hits += FINANCIAL_KEYWORDS
                    .iter()
                    .filter(|kw| lowered.contains(*kw))
                    .count();
            }
        }
    }

    year_hits >= MIN_YEAR_HITS && keyword_hits >= MIN_KEYWORD_HITS
}

/// Interpret a cell as a plausible calendar year: an integer in
/// [1990, 2050], or text like `FY2023` / `2023E`.
fn cell_year(cell: &Cell) -> Option<i32> {
    match cell {
        Cell::Number(value) => {
            if value.fract() == 0.0 && *value >= f64::from(YEAR_MIN) && *value <= f64::from(YEAR_MAX)
            {
                Some(*value as i32)
            } else {
                None
            }
        }
        Cell::Text(text) => {
            let digits: String = text.chars().filter(|ch| ch.is_ascii_digit()).collect();
            if digits.len() != 4 {
                return None;
            }
            let year = digits.parse::<i32>().ok()?;
            (YEAR_MIN..=YEAR_MAX).contains(&year).then_some(year)
        }
        Cell::Empty => None,
    }
}

/// Locate the dominant year run. Rows are scanned first; a row run wins over
/// a column run of the same length.
fn find_year_run(sheet: &Sheet) -> Option<YearRun> {
    let mut best: Option<YearRun> = None;

    for (row_idx, row) in sheet.rows.iter().enumerate().take(SCAN_ROWS) {
        let candidates: Vec<(usize, i32)> = row
            .iter()
            .take(SCAN_COLS)
            .enumerate()
            .filter_map(|(col, cell)| cell_year(cell).map(|year| (col, year)))
            .collect();
        if let Some((positions, run_years)) = longest_year_run(&candidates) {
            if best
                .as_ref()
                .map_or(true, |current| run_years.len() > current.years.len())
            {
                best = Some(YearRun {
                    orientation: Orientation::Rows,
                    axis: row_idx,
                    years: run_years,
                    positions,
                });
            }
        }
    }

    if best.is_some() {
        return best;
    }

    let width = sheet.rows.iter().map(Vec::len).max().unwrap_or(0);
    for col in 0..width.min(SCAN_COLS) {
        let candidates: Vec<(usize, i32)> = sheet
            .rows
            .iter()
            .enumerate()
            .take(SCAN_ROWS.max(LOOKS_FINANCIAL_ROWS))
            .filter_map(|(row_idx, row)| {
                row.get(col)
                    .and_then(cell_year)
                    .map(|year| (row_idx, year))
            })
            .collect();
        if let Some((positions, run_years)) = longest_year_run(&candidates) {
            if best
                .as_ref()
                .map_or(true, |current| run_years.len() > current.years.len())
            {
                best = Some(YearRun {
                    orientation: Orientation::Columns,
                    axis: col,
                    years: run_years,
                    positions,
                });
            }
        }
    }

    best
}

/// Longest contiguous run of strictly monotonic years with gaps of at most
/// `MAX_YEAR_GAP`, at least `MIN_RUN_LEN` long. Published statements often
/// put the most recent year first, so descending runs are accepted and come
/// back normalized to ascending year order with positions aligned.
fn longest_year_run(candidates: &[(usize, i32)]) -> Option<(Vec<usize>, Vec<i32>)> {
    let forward = longest_ascending_run(candidates);
    let reversed: Vec<(usize, i32)> = candidates.iter().rev().copied().collect();
    let backward = longest_ascending_run(&reversed);

    match (forward, backward) {
        (Some(fwd), Some(bwd)) if bwd.1.len() > fwd.1.len() => Some(bwd),
        (fwd @ Some(_), _) => fwd,
        (None, bwd) => bwd,
    }
}

fn longest_ascending_run(candidates: &[(usize, i32)]) -> Option<(Vec<usize>, Vec<i32>)> {
    let mut best: Option<(Vec<usize>, Vec<i32>)> = None;
    let mut current_pos: Vec<usize> = Vec::new();
    let mut current_years: Vec<i32> = Vec::new();

    for &(pos, year) in candidates {
        let extends = current_years
            .last()
            .map_or(true, |&last| year > last && year - last <= MAX_YEAR_GAP);
        if !extends {
            consider(&mut best, &current_pos, &current_years);
            current_pos.clear();
            current_years.clear();
        }
        current_pos.push(pos);
        current_years.push(year);
    }
    consider(&mut best, &current_pos, &current_years);

    best
}

fn consider(best: &mut Option<(Vec<usize>, Vec<i32>)>, positions: &[usize], years: &[i32]) {
    if years.len() < MIN_RUN_LEN {
        return;
    }
    if best
        .as_ref()
        .map_or(true, |(_, best_years)| years.len() > best_years.len())
    {
        *best = Some((positions.to_vec(), years.to_vec()));
    }
}
