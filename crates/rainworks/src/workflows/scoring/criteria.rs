//! Per-criterion normalization. Every function returns a value in `[0, 1]`.

/// Free slots at which the capacity bonus reaches one half.
const CAPACITY_HALF_SATURATION: f64 = 0.5;
/// Band-to-estimate ratio above 1.0 at which the cost-band value hits zero.
const OVERPRICE_SPAN: f64 = 0.5;
/// Band-to-estimate ratio below 1.0 at which the cost-band value hits zero.
const UNDERPRICE_SPAN: f64 = 0.3;
/// Quotes under this share of the estimate are treated as suspiciously low.
const PRICE_FLOOR_RATIO: f64 = 0.7;
const PRICE_CEILING_RATIO: f64 = 1.5;
const DISTANCE_SCALE_KM: f64 = 25.0;
const TIMELINE_SCALE_DAYS: f64 = 30.0;
const WARRANTY_CAP_MONTHS: f64 = 60.0;
const NEUTRAL: f64 = 0.5;

pub(crate) fn capacity(available: u32) -> f64 {
    let available = f64::from(available);
    available / (available + CAPACITY_HALF_SATURATION)
}

pub(crate) fn percentage(value: f64) -> f64 {
    clamp_unit(value / 100.0)
}

pub(crate) fn cost_band(band_midpoint: Option<f64>, estimated_cost: u64) -> f64 {
    let Some(midpoint) = band_midpoint else {
        return NEUTRAL;
    };
    if estimated_cost == 0 {
        return NEUTRAL;
    }

    let ratio = midpoint / estimated_cost as f64;
    if ratio >= 1.0 {
        clamp_unit(1.0 - (ratio - 1.0) / OVERPRICE_SPAN)
    } else {
        clamp_unit(1.0 - (1.0 - ratio) / UNDERPRICE_SPAN)
    }
}

pub(crate) fn price(quoted: u64, estimated_cost: u64) -> f64 {
    if estimated_cost == 0 {
        return NEUTRAL;
    }

    let ratio = quoted as f64 / estimated_cost as f64;
    if ratio >= PRICE_FLOOR_RATIO {
        clamp_unit((PRICE_CEILING_RATIO - ratio) / (PRICE_CEILING_RATIO - PRICE_FLOOR_RATIO))
    } else {
        // Lowball quotes lose credit the further they fall below the floor.
        clamp_unit(1.0 - (PRICE_FLOOR_RATIO - ratio) / (PRICE_FLOOR_RATIO / 2.0))
    }
}

pub(crate) fn distance(km: f64) -> f64 {
    if !km.is_finite() || km < 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + km / DISTANCE_SCALE_KM)
}

pub(crate) fn timeline(days: u32) -> f64 {
    1.0 / (1.0 + f64::from(days) / TIMELINE_SCALE_DAYS)
}

pub(crate) fn warranty(months: u32) -> f64 {
    f64::from(months).min(WARRANTY_CAP_MONTHS) / WARRANTY_CAP_MONTHS
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
