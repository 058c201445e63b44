use crate::transform::WeeklyMetric;
use serde::Serialize;

/// Period totals over a sequence of weekly records. Additive fields are
/// summed; rate and ratio fields are the arithmetic mean of the weekly
/// values. Averaging the weekly ratios is deliberate and not the same number
/// as recomputing the ratio from the summed totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricTotals {
    pub weeks: usize,
    pub investment: f64,
    pub traffic_revenue: f64,
    pub traffic_roas: f64,
    pub enrolled_count: f64,
    pub form_submissions: f64,
    pub fill_rate: f64,
    pub qualified_count: f64,
    pub scheduled_count: f64,
    pub scheduling_rate: f64,
    pub calls_completed: f64,
    pub attendance_rate: f64,
    pub sale_count: f64,
    pub conversion_rate: f64,
    pub ascension_rate: f64,
    pub monetization_sale_value: f64,
    pub entries_count: f64,
    pub funnel_revenue: f64,
    pub funnel_roas: f64,
    pub funnel_profit: f64,
}

pub fn aggregate(weeks: &[WeeklyMetric]) -> MetricTotals {
    let mut totals = MetricTotals {
        weeks: weeks.len(),
        ..MetricTotals::default()
    };
    if weeks.is_empty() {
        return totals;
    }

    for week in weeks {
        totals.investment += week.investment;
        totals.traffic_revenue += week.traffic_revenue;
        totals.traffic_roas += week.traffic_roas;
        totals.enrolled_count += week.enrolled_count;
        totals.form_submissions += week.form_submissions;
        totals.fill_rate += week.fill_rate;
        totals.qualified_count += week.qualified_count;
        totals.scheduled_count += week.scheduled_count;
        totals.scheduling_rate += week.scheduling_rate;
        totals.calls_completed += week.calls_completed;
        totals.attendance_rate += week.attendance_rate;
        totals.sale_count += week.sale_count;
        totals.conversion_rate += week.conversion_rate;
        totals.ascension_rate += week.ascension_rate;
        totals.monetization_sale_value += week.monetization_sale_value;
        totals.entries_count += week.entries_count;
        totals.funnel_revenue += week.funnel_revenue;
        totals.funnel_roas += week.funnel_roas;
        totals.funnel_profit += week.funnel_profit;
    }

    let n = weeks.len() as f64;
    totals.traffic_roas /= n;
    totals.fill_rate /= n;
    totals.scheduling_rate /= n;
    totals.attendance_rate /= n;
    totals.conversion_rate /= n;
    totals.ascension_rate /= n;
    totals.funnel_roas /= n;

    totals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sequence_is_all_zeros() {
        let totals = aggregate(&[]);
        assert_eq!(totals, MetricTotals::default());
        assert_eq!(totals.investment, 0.0);
        assert_eq!(totals.funnel_roas, 0.0);
    }

    #[test]
    fn sums_additive_fields() {
        let weeks = vec![
            WeeklyMetric {
                investment: 10.0,
                ..WeeklyMetric::default()
            },
            WeeklyMetric {
                investment: 20.0,
                ..WeeklyMetric::default()
            },
        ];
        let totals = aggregate(&weeks);
        assert_eq!(totals.weeks, 2);
        assert_eq!(totals.investment, 30.0);
    }

    #[test]
    fn averages_ratio_fields_instead_of_recomputing() {
        let weeks = vec![
            WeeklyMetric {
                investment: 100.0,
                funnel_revenue: 400.0,
                funnel_roas: 4.0,
                traffic_roas: 3.0,
                ..WeeklyMetric::default()
            },
            WeeklyMetric {
                investment: 300.0,
                funnel_revenue: 300.0,
                funnel_roas: 1.0,
                traffic_roas: 1.0,
                ..WeeklyMetric::default()
            },
        ];
        let totals = aggregate(&weeks);
        assert_eq!(totals.investment, 400.0);
        assert_eq!(totals.funnel_revenue, 700.0);
        // Mean of per-week ratios (2.5), not total revenue over total
        // investment (1.75)
        assert_eq!(totals.funnel_roas, 2.5);
        assert_eq!(totals.traffic_roas, 2.0);
    }

    #[test]
    fn averages_rate_fields() {
        let weeks = vec![
            WeeklyMetric {
                fill_rate: 80.0,
                attendance_rate: 60.0,
                ..WeeklyMetric::default()
            },
            WeeklyMetric {
                fill_rate: 40.0,
                attendance_rate: 20.0,
                ..WeeklyMetric::default()
            },
        ];
        let totals = aggregate(&weeks);
        assert_eq!(totals.fill_rate, 60.0);
        assert_eq!(totals.attendance_rate, 40.0);
    }
}
