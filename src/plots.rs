use crate::ages::AgeSlice;
use crate::analysis::{ratio_series, smooth, tier_bounds, tier_for, GroupBy, SeriesFilter};
use crate::errors::AppError;
use crate::geo::{RegionShapes, RegionTranslator};
use crate::scenarios::ScenarioBundle;
use plotters::prelude::*;
use std::path::Path;

const FEMALE: &str = "2";
const MALE: &str = "1";
const EN_DASH: char = '\u{2013}';

/// Map tier colors, lowest tier first.
const TIER_COLORS: [RGBColor; 3] = [
    RGBColor(255, 160, 122), // lightsalmon
    RGBColor(255, 99, 71),   // tomato
    RGBColor(255, 0, 0),     // red
];

/// Presentation configuration, passed explicitly into every plot call.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    /// Render decimals with a comma, Swedish style.
    pub decimal_comma: bool,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            decimal_comma: true,
        }
    }
}

fn plot_err(e: impl std::fmt::Display) -> AppError {
    AppError::PlotError(e.to_string())
}

/// Rounds to four decimals and applies the configured decimal separator.
fn format_ratio(value: f64, config: &PlotConfig) -> String {
    let rounded = (value * 10_000.0).round() / 10_000.0;
    let text = rounded.to_string();
    if config.decimal_comma {
        text.replace('.', ",")
    } else {
        text
    }
}

/// Region label with its leading code stripped ("01 Stockholms län" ->
/// "Stockholms län").
fn region_alias(label: &str, code: &str) -> String {
    label.replace(code, "").trim_start().to_string()
}

fn denominator_alias(bundle: &ScenarioBundle) -> String {
    match &bundle.denominator_kind {
        crate::analysis::Denominator::Cause(code) => bundle
            .denominator
            .dimensions
            .label("Dodsorsak", code)
            .unwrap_or(code.as_str())
            .to_string(),
        crate::analysis::Denominator::Population => bundle
            .denominator
            .dimensions
            .label("ContentsCode", crate::query::POPULATION_CONTENT_CODE)
            .unwrap_or("folkmängden")
            .to_string(),
    }
}

fn sex_alias(bundle: &ScenarioBundle, sex: &str) -> String {
    bundle
        .numerator
        .dimensions
        .label("Kon", sex)
        .unwrap_or(sex)
        .to_string()
}

/// Time-trend plot: per sex, one yearly ratio line plus its smoothed
/// overlay, y-axis clipped at zero.
///
/// # Arguments
///
/// * `bundle` - Scenario with a single-region numerator/denominator pair.
/// * `ages` - Age bands to aggregate over, with their display label.
/// * `config` - Presentation configuration.
/// * `output` - PNG output path.
pub fn trend_plot(
    bundle: &ScenarioBundle,
    ages: &AgeSlice,
    config: &PlotConfig,
    output: &Path,
) -> Result<(), AppError> {
    let region = bundle
        .region
        .as_deref()
        .ok_or_else(|| AppError::PlotError("trend plot needs a region".to_string()))?;

    // Female first, male second, as the source labels order them.
    let mut series_per_sex = Vec::new();
    for sex in [FEMALE, MALE] {
        let filter = SeriesFilter {
            sex: sex.to_string(),
            region: Some(region.to_string()),
            ages: ages.bands.clone(),
            years: None,
        };
        let series = ratio_series(
            &bundle.numerator.table,
            &bundle.numerator_cause,
            &bundle.denominator.table,
            &bundle.denominator_kind,
            &filter,
            GroupBy::Year,
        );
        let points: Vec<(i32, f64)> = series
            .iter()
            .filter_map(|(year, ratio)| {
                let year: i32 = year.parse().ok()?;
                ratio.is_finite().then_some((year, *ratio))
            })
            .collect();
        series_per_sex.push((sex, points));
    }

    let (min_year, max_year, max_ratio) = series_per_sex
        .iter()
        .flat_map(|(_, pts)| pts.iter())
        .fold((i32::MAX, i32::MIN, 0.0f64), |(lo, hi, m), &(y, r)| {
            (lo.min(y), hi.max(y), m.max(r))
        });
    if min_year > max_year {
        return Err(AppError::PlotError("no plottable ratios".to_string()));
    }

    let num_alias = bundle
        .numerator
        .dimensions
        .label("Dodsorsak", &bundle.numerator_cause)
        .unwrap_or(bundle.numerator_cause.as_str())
        .to_string();
    let denom_alias = denominator_alias(bundle);
    let region_label = bundle
        .numerator
        .dimensions
        .label("Region", region)
        .unwrap_or(region)
        .to_string();
    let title = format!(
        "Döda {}/{}, {} {}",
        num_alias,
        denom_alias,
        ages.label,
        region_alias(&region_label, region)
    );

    let root = BitMapBackend::new(output, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(title, ("sans-serif", 30))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(min_year..max_year, 0.0..max_ratio * 1.05)
        .map_err(plot_err)?;
    chart.configure_mesh().x_desc("År").draw().map_err(plot_err)?;

    for (sex, points) in &series_per_sex {
        let color = if *sex == FEMALE { RED } else { BLUE };
        let alias = sex_alias(bundle, sex);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), &color))
            .map_err(plot_err)?
            .label(alias.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));

        let smooth_input: Vec<(f64, f64)> =
            points.iter().map(|&(y, r)| (y as f64, r)).collect();
        let smoothed: Vec<(i32, f64)> = smooth(&smooth_input)
            .into_iter()
            .filter(|(_, r)| r.is_finite())
            .map(|(y, r)| (y as i32, r))
            .collect();
        let soft = color.mix(0.5);
        chart
            .draw_series(LineSeries::new(
                smoothed,
                soft.stroke_width(3),
            ))
            .map_err(plot_err)?
            .label(format!("{} jämnad", alias))
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], soft.stroke_width(3))
            });
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.5))
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    tracing::info!("Wrote trend plot to {}", output.display());
    Ok(())
}

/// Two-sex scatter: one point per region, x = female ratio, y = male
/// ratio, each point annotated with its region code.
pub fn sex_scatter(
    bundle: &ScenarioBundle,
    ages: &AgeSlice,
    config: &PlotConfig,
    output: &Path,
) -> Result<(), AppError> {
    let mut by_sex = Vec::new();
    for sex in [FEMALE, MALE] {
        let filter = SeriesFilter::for_sex(sex, &ages.bands);
        by_sex.push(ratio_series(
            &bundle.numerator.table,
            &bundle.numerator_cause,
            &bundle.denominator.table,
            &bundle.denominator_kind,
            &filter,
            GroupBy::Region,
        ));
    }
    let (female, male) = (&by_sex[0], &by_sex[1]);

    let points: Vec<(String, f64, f64)> = female
        .iter()
        .filter_map(|(region, x)| {
            let y = male.get(region)?;
            (x.is_finite() && y.is_finite()).then(|| (region.clone(), *x, *y))
        })
        .collect();
    if points.is_empty() {
        return Err(AppError::PlotError("no plottable regions".to_string()));
    }

    let max_x = points.iter().map(|p| p.1).fold(0.0f64, f64::max);
    let max_y = points.iter().map(|p| p.2).fold(0.0f64, f64::max);

    let num_alias = bundle
        .numerator
        .dimensions
        .label("Dodsorsak", &bundle.numerator_cause)
        .unwrap_or(bundle.numerator_cause.as_str())
        .to_string();
    let denom_alias = denominator_alias(bundle);
    let span = bundle
        .numerator
        .table
        .year_span()
        .map(|(start, end)| format!("{}{}{}", start, EN_DASH, end))
        .unwrap_or_default();
    let title = format!("Döda {}/{}, {} {}", num_alias, denom_alias, ages.label, span);

    let root = BitMapBackend::new(output, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(title, ("sans-serif", 30))
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..max_x * 1.1, 0.0..max_y * 1.1)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .x_desc(sex_alias(bundle, FEMALE))
        .y_desc(sex_alias(bundle, MALE))
        .draw()
        .map_err(plot_err)?;

    chart
        .draw_series(points.iter().map(|(code, x, y)| {
            EmptyElement::at((*x, *y))
                + Circle::new((0, 0), 3, RED.filled())
                + Text::new(code.clone(), (6, -6), ("sans-serif", 13))
        }))
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    tracing::info!("Wrote sex scatter to {}", output.display());
    Ok(())
}

/// Percentile choropleth: region polygons colored by ratio tier.
///
/// Regions without a translation, geometry, or finite ratio are skipped
/// silently; the view frames only the regions actually drawn.
///
/// # Arguments
///
/// * `bundle` - Scenario over many regions.
/// * `ages` - Age bands to aggregate over.
/// * `sex` - Sex code the map is drawn for.
/// * `translator` - Region-code to geometry-unit translation table.
/// * `shapes` - Loaded polygon records.
/// * `config` - Presentation configuration.
/// * `output` - PNG output path.
pub fn choropleth(
    bundle: &ScenarioBundle,
    ages: &AgeSlice,
    sex: &str,
    translator: &RegionTranslator,
    shapes: &RegionShapes,
    config: &PlotConfig,
    output: &Path,
) -> Result<(), AppError> {
    let filter = SeriesFilter::for_sex(sex, &ages.bands);
    let series = ratio_series(
        &bundle.numerator.table,
        &bundle.numerator_cause,
        &bundle.denominator.table,
        &bundle.denominator_kind,
        &filter,
        GroupBy::Region,
    );
    let ratios: Vec<f64> = series.values().copied().collect();
    let bounds = tier_bounds(&ratios)
        .ok_or_else(|| AppError::PlotError("no finite ratios to bucket".to_string()))?;

    // Boundaries valid at the window's end year; missing spans never expire.
    let validity_year: i32 = bundle
        .numerator
        .table
        .year_span()
        .and_then(|(_, end)| end.parse().ok())
        .unwrap_or(i32::MAX);

    // Tier index -> polygons, plus the bounding box of everything drawn.
    let mut tiers: [Vec<&crate::geo::RegionShape>; 3] = [vec![], vec![], vec![]];
    let mut view = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for shape in &shapes.shapes {
        if !shape.valid_in(validity_year) {
            continue;
        }
        let region = match translator.region_for(&shape.unit_code) {
            Some(region) => region,
            None => continue,
        };
        let ratio = match series.get(region) {
            Some(r) => *r,
            None => continue,
        };
        let tier = match tier_for(ratio, &bounds) {
            Some(t) => t,
            None => continue,
        };
        tiers[tier].push(shape);
        view.0 = view.0.min(shape.bounds.0);
        view.1 = view.1.min(shape.bounds.1);
        view.2 = view.2.max(shape.bounds.2);
        view.3 = view.3.max(shape.bounds.3);
    }
    if tiers.iter().all(Vec::is_empty) {
        return Err(AppError::PlotError("no plottable regions".to_string()));
    }

    let num_alias = bundle
        .numerator
        .dimensions
        .label("Dodsorsak", &bundle.numerator_cause)
        .unwrap_or(bundle.numerator_cause.as_str())
        .to_string();
    let denom_alias = denominator_alias(bundle);
    let span = bundle
        .numerator
        .table
        .year_span()
        .map(|(start, end)| format!("{}{}{}", start, EN_DASH, end))
        .unwrap_or_default();
    let title = format!(
        "Döda {}/{}, {} {} {}",
        num_alias,
        denom_alias,
        sex_alias(bundle, sex),
        ages.label,
        span
    );

    let root = BitMapBackend::new(output, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(title, ("sans-serif", 30))
        .build_cartesian_2d(view.0..view.2, view.1..view.3)
        .map_err(plot_err)?;

    for (tier, shapes_in_tier) in tiers.iter().enumerate() {
        let color = TIER_COLORS[tier];
        let polygons = shapes_in_tier
            .iter()
            .flat_map(|shape| shape.rings.iter())
            .map(|ring| Polygon::new(ring.clone(), color.filled()));
        chart
            .draw_series(polygons)
            .map_err(plot_err)?
            .label(format!("\u{2264}{}", format_ratio(bounds[tier], config)))
            .legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 12, y + 6)], color.filled())
            });
        // Black edge over each ring.
        let edges = shapes_in_tier
            .iter()
            .flat_map(|shape| shape.rings.iter())
            .map(|ring| PathElement::new(ring.clone(), BLACK));
        chart.draw_series(edges).map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    tracing::info!("Wrote choropleth to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_formatting_respects_locale() {
        let sv = PlotConfig::default();
        let en = PlotConfig {
            decimal_comma: false,
            ..PlotConfig::default()
        };
        assert_eq!(format_ratio(0.123456, &sv), "0,1235");
        assert_eq!(format_ratio(0.123456, &en), "0.1235");
        assert_eq!(format_ratio(0.5, &sv), "0,5");
    }

    #[test]
    fn region_alias_strips_code() {
        assert_eq!(region_alias("01 Stockholms län", "01"), "Stockholms län");
        assert_eq!(region_alias("Stockholms län", "01"), "Stockholms län");
    }
}
