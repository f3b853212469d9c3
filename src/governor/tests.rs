use std::sync::Arc;
use std::time::Duration;

use super::*;

#[test]
fn test_cost_parse_and_display() {
    let cost: Cost = "25.5".parse().unwrap();
    assert_eq!(cost.micros(), 25_500_000);
    assert_eq!(cost.to_string(), "25.500000");
    assert_eq!(Cost::from_micros(1_234).to_string(), "0.001234");

    assert!("-1".parse::<Cost>().is_err());
    assert!("abc".parse::<Cost>().is_err());
    assert!("NaN".parse::<Cost>().is_err());
}

#[test]
fn test_cost_from_amount_clamps() {
    assert_eq!(Cost::from_amount(-3.0), Cost::ZERO);
    assert_eq!(Cost::from_amount(f64::NAN), Cost::ZERO);
    assert_eq!(Cost::from_amount(0.0000014).micros(), 1);
    assert_eq!(
        [Cost::from_micros(1), Cost::from_micros(2)]
            .into_iter()
            .sum::<Cost>(),
        Cost::from_micros(3)
    );
}

fn grant(admission: Admission) -> BudgetPermit {
    match admission {
        Admission::Granted(permit) => permit,
        other => panic!("expected grant, got {:?}", other),
    }
}

#[test]
fn test_budget_admits_until_cap() {
    let call = Cost::from_micros(1_000);
    let governor = BudgetGovernor::new(call.saturating_mul(3), Cost::ZERO);

    for _ in 0..3 {
        grant(governor.try_reserve(call)).commit(call);
    }

    assert!(governor.is_exhausted());
    assert!(matches!(
        governor.try_reserve(call),
        Admission::Exhausted { spent, .. } if spent == call.saturating_mul(3)
    ));
}

#[test]
fn test_budget_restored_spend_counts() {
    let governor = BudgetGovernor::new(Cost::from_micros(10), Cost::from_micros(10));
    assert!(matches!(
        governor.try_reserve(Cost::from_micros(1)),
        Admission::Exhausted { .. }
    ));
}

#[test]
fn test_dropped_permit_releases_without_cost() {
    let governor = BudgetGovernor::new(Cost::from_micros(100), Cost::ZERO);
    let permit = grant(governor.try_reserve(Cost::from_micros(40)));
    assert_eq!(governor.in_flight(), 1);
    assert_eq!(governor.reserved(), Cost::from_micros(40));
    drop(permit);
    assert_eq!(governor.in_flight(), 0);
    assert_eq!(governor.reserved(), Cost::ZERO);
    assert_eq!(governor.spent(), Cost::ZERO);
}

#[test]
fn test_budget_defers_while_reservations_reach_cap() {
    let governor = BudgetGovernor::new(Cost::from_micros(100), Cost::ZERO);
    let first = grant(governor.try_reserve(Cost::from_micros(60)));
    let second = grant(governor.try_reserve(Cost::from_micros(60)));
    // 120 reserved >= 100.
    assert!(matches!(
        governor.try_reserve(Cost::from_micros(1)),
        Admission::Deferred
    ));

    // Commit swaps the reservation for the actual cost: 10 spent + 60 reserved.
    assert_eq!(first.commit(Cost::from_micros(10)), Cost::from_micros(10));
    assert_eq!(governor.reserved(), Cost::from_micros(60));
    let third = grant(governor.try_reserve(Cost::from_micros(60)));
    assert!(matches!(
        governor.try_reserve(Cost::from_micros(1)),
        Admission::Deferred
    ));
    second.commit(Cost::from_micros(60));
    third.commit(Cost::from_micros(60));
    assert_eq!(governor.spent(), Cost::from_micros(130));
    assert!(governor.is_exhausted());
}

#[test]
fn test_cheap_first_call_does_not_admit_expensive_burst() {
    let cap = Cost::from_micros(50);
    let expensive = Cost::from_micros(20);
    let governor = BudgetGovernor::new(cap, Cost::ZERO);
    grant(governor.try_reserve(expensive)).commit(Cost::from_micros(1));

    let mut permits = Vec::new();
    for _ in 0..8 {
        match governor.try_reserve(expensive) {
            Admission::Granted(permit) => permits.push(permit),
            _ => break,
        }
    }
    assert_eq!(permits.len(), 3);
    for permit in permits {
        permit.commit(expensive);
    }

    assert_eq!(governor.spent(), Cost::from_micros(61));
    assert!(governor.spent() <= cap + expensive);
}

#[tokio::test]
async fn test_concurrent_spend_bounded_by_one_call() {
    let call = Cost::from_micros(7);
    let cap = Cost::from_micros(50);
    let governor = BudgetGovernor::new(cap, Cost::ZERO);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let governor = Arc::clone(&governor);
            tokio::spawn(async move {
                let mut calls = 0u32;
                while let Some(permit) = governor.reserve(call).await {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    permit.commit(call);
                    calls += 1;
                }
                calls
            })
        })
        .collect();

    let mut total_calls = 0;
    for handle in handles {
        total_calls += handle.await.unwrap();
    }

    assert!(governor.spent() >= cap);
    assert!(governor.spent() <= cap + call);
    assert_eq!(governor.spent(), call.saturating_mul(total_calls as u64));
}

#[tokio::test]
async fn test_concurrent_spend_bounded_with_uneven_costs() {
    let cap = Cost::from_micros(1_000);
    let largest = Cost::from_micros(300);
    let governor = BudgetGovernor::new(cap, Cost::ZERO);

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let governor = Arc::clone(&governor);
            tokio::spawn(async move {
                let mut round = 0u64;
                while let Some(permit) = governor.reserve(largest).await {
                    // Actual costs range from 1 to the full reservation.
                    let cost = Cost::from_micros(1 + (worker * 37 + round * 101) % 300);
                    tokio::time::sleep(Duration::from_millis(1 + worker % 3)).await;
                    permit.commit(cost);
                    round += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(governor.spent() >= cap);
    assert!(governor.spent() <= cap + largest);
    assert_eq!(governor.in_flight(), 0);
    assert_eq!(governor.reserved(), Cost::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_rate_governor_spaces_calls() {
    let governor = RateGovernor::new(Duration::from_millis(500));
    let start = tokio::time::Instant::now();

    governor.acquire().await;
    governor.acquire().await;
    governor.acquire().await;

    assert!(start.elapsed() >= Duration::from_millis(1_000));
}

#[tokio::test(start_paused = true)]
async fn test_rate_governor_shared_across_tasks() {
    let governor = Arc::new(RateGovernor::new(Duration::from_millis(100)));
    let start = tokio::time::Instant::now();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let governor = Arc::clone(&governor);
            tokio::spawn(async move { governor.acquire().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_zero_interval_never_waits() {
    let governor = RateGovernor::new(Duration::ZERO);
    for _ in 0..100 {
        governor.acquire().await;
    }
    assert_eq!(governor.min_interval(), Duration::ZERO);
}
