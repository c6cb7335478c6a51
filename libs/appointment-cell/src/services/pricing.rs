// libs/appointment-cell/src/services/pricing.rs
//
// Price and duration math over catalog value objects. Deliberately free of
// I/O: the factory feeds batch-loaded rows in, frozen numbers come out.

use uuid::Uuid;

use crate::models::{
    GroupTotals, Service, ServiceCalculation, ServiceDuration, ServicePrice, ServiceVariation,
};

/// Final price: base plus the variation delta, missing values as zero.
/// Negative deltas pass through unclamped.
pub fn service_price(service: &Service, variation: Option<&ServiceVariation>) -> ServicePrice {
    let base = service.price.unwrap_or(0.0);
    let variation_delta = variation.map(|v| v.price_delta).unwrap_or(0.0);

    ServicePrice {
        base,
        variation_delta,
        final_price: base + variation_delta,
    }
}

/// Total chair time: base + processing + finishing + variation delta.
pub fn service_duration(service: &Service, variation: Option<&ServiceVariation>) -> ServiceDuration {
    let base = service.duration_minutes.unwrap_or(0);
    let processing = service.processing_time.unwrap_or(0);
    let finishing = service.finishing_time.unwrap_or(0);
    let variation_delta = variation.map(|v| v.duration_delta).unwrap_or(0);

    ServiceDuration {
        base,
        processing,
        finishing,
        variation_delta,
        total: base + processing + finishing + variation_delta,
    }
}

pub fn calculate(
    service: &Service,
    variation: Option<&ServiceVariation>,
    professional_id: Uuid,
) -> ServiceCalculation {
    ServiceCalculation {
        service_id: service.id,
        variation_id: variation.map(|v| v.id),
        professional_id,
        price: service_price(service, variation),
        duration: service_duration(service, variation),
        execution_order: service.execution_order,
        execution_flexible: service.execution_flexible,
    }
}

pub fn group_totals(calculations: &[ServiceCalculation]) -> GroupTotals {
    GroupTotals {
        total_price: calculations.iter().map(|c| c.price.final_price).sum(),
        total_duration_minutes: calculations.iter().map(|c| c.duration.total).sum(),
        service_count: calculations.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(price: Option<f64>, duration: Option<i32>, processing: Option<i32>, finishing: Option<i32>) -> Service {
        Service {
            id: Uuid::new_v4(),
            name: "Coloring".to_string(),
            price,
            duration_minutes: duration,
            processing_time: processing,
            finishing_time: finishing,
            execution_order: 1,
            execution_flexible: false,
            parallelable: false,
            max_parallel_pros: None,
            active: true,
        }
    }

    fn variation(price_delta: f64, duration_delta: i32) -> ServiceVariation {
        ServiceVariation {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            name: "Long hair".to_string(),
            price_delta,
            duration_delta,
        }
    }

    #[test]
    fn price_and_duration_with_variation() {
        // 80 + 25 = 105.00; 90 + 15 + 10 + 30 = 145
        let svc = service(Some(80.0), Some(90), Some(15), Some(10));
        let var = variation(25.0, 30);

        let price = service_price(&svc, Some(&var));
        assert!((price.final_price - 105.0).abs() < f64::EPSILON);

        let duration = service_duration(&svc, Some(&var));
        assert_eq!(duration.total, 145);
    }

    #[test]
    fn missing_values_are_treated_as_zero() {
        let svc = service(None, None, None, None);

        let price = service_price(&svc, None);
        assert_eq!(price.final_price, 0.0);

        let duration = service_duration(&svc, None);
        assert_eq!(duration.total, 0);
    }

    #[test]
    fn negative_deltas_are_not_clamped() {
        let svc = service(Some(50.0), Some(60), None, None);
        let var = variation(-20.0, -15);

        let price = service_price(&svc, Some(&var));
        assert!((price.final_price - 30.0).abs() < f64::EPSILON);

        let duration = service_duration(&svc, Some(&var));
        assert_eq!(duration.total, 45);
    }

    #[test]
    fn group_totals_sum_children() {
        let first = calculate(&service(Some(80.0), Some(90), Some(15), Some(10)), Some(&variation(25.0, 30)), Uuid::new_v4());
        let second = calculate(&service(Some(40.0), Some(30), None, None), None, Uuid::new_v4());

        let totals = group_totals(&[first, second]);
        assert!((totals.total_price - 145.0).abs() < f64::EPSILON);
        assert_eq!(totals.total_duration_minutes, 175);
        assert_eq!(totals.service_count, 2);
    }

    #[test]
    fn totals_of_empty_set_are_zero() {
        let totals = group_totals(&[]);
        assert_eq!(totals.total_price, 0.0);
        assert_eq!(totals.total_duration_minutes, 0);
        assert_eq!(totals.service_count, 0);
    }
}
