//! Property-based tests for the pure stock rules.
//!
//! These cover the arithmetic the dashboard and the ledger rely on across a
//! wide range of inputs.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};
use estoque_api::entities::MovementKind;
use estoque_api::forms::ProductForm;
use estoque_api::stock::{self, MonthlyTotals, StockLevel};
use proptest::prelude::*;

struct Level(i32, i32);

impl StockLevel for Level {
    fn quantidade_estoque(&self) -> i32 {
        self.0
    }

    fn estoque_minimo(&self) -> i32 {
        self.1
    }
}

fn kind_strategy() -> impl Strategy<Value = MovementKind> {
    prop_oneof![Just(MovementKind::Entrada), Just(MovementKind::Saida)]
}

fn movement_strategy() -> impl Strategy<Value = (MovementKind, i32)> {
    (kind_strategy(), 1i32..10_000)
}

fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    // 2000-01-01 .. 2100-01-01
    (946_684_800i64..4_102_444_800).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn offset_strategy() -> impl Strategy<Value = FixedOffset> {
    (-12i32..=14).prop_map(|hours| FixedOffset::east_opt(hours * 3600).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn stock_never_goes_negative(
        start in 0i32..100_000,
        movements in prop::collection::vec(movement_strategy(), 0..50),
    ) {
        let mut current = start;
        for (kind, qty) in movements {
            match stock::apply_movement(current, kind, qty) {
                Some(next) => {
                    prop_assert!(next >= 0);
                    current = next;
                }
                None => prop_assert_eq!(kind, MovementKind::Saida),
            }
        }
    }

    #[test]
    fn totals_match_a_manual_sum(movements in prop::collection::vec(movement_strategy(), 0..100)) {
        let totals = MonthlyTotals::from_movements(&movements);
        let entradas: i64 = movements
            .iter()
            .filter(|(k, _)| *k == MovementKind::Entrada)
            .map(|(_, q)| i64::from(*q))
            .sum();
        let saidas: i64 = movements
            .iter()
            .filter(|(k, _)| *k == MovementKind::Saida)
            .map(|(_, q)| i64::from(*q))
            .sum();
        prop_assert_eq!(totals, MonthlyTotals { entradas, saidas });
    }

    #[test]
    fn alerts_are_exactly_the_strictly_low(
        levels in prop::collection::vec((0i32..50, 0i32..50), 0..40)
    ) {
        let items: Vec<Level> = levels.iter().map(|(q, m)| Level(*q, *m)).collect();
        let alerts = stock::below_minimum(&items);
        let expected = levels.iter().filter(|(q, m)| q < m).count();
        prop_assert_eq!(alerts.len(), expected);
        prop_assert!(alerts.iter().all(|l| l.0 < l.1));
    }

    #[test]
    fn month_start_is_local_midnight_on_the_first(now in instant_strategy(), offset in offset_strategy()) {
        let start = stock::month_start(now, offset);
        prop_assert!(start <= now);

        let local = start.with_timezone(&offset);
        prop_assert_eq!(local.day(), 1);
        prop_assert_eq!((local.hour(), local.minute(), local.second()), (0, 0, 0));

        let local_now = now.with_timezone(&offset);
        prop_assert_eq!((local.year(), local.month()), (local_now.year(), local_now.month()));
    }

    #[test]
    fn product_form_trims_every_text_field(
        nome in "[A-Za-z]{1,20}",
        pad in "[ \t]{0,4}",
        minimo in 0i32..1000,
    ) {
        let payload = ProductForm {
            nome: format!("{pad}{nome}{pad}"),
            descricao: pad.clone(),
            categoria: format!("{pad}Ferramentas"),
            material: "Aço".into(),
            tamanho: pad.clone(),
            peso: String::new(),
            estoque_minimo: minimo.to_string(),
        }
        .into_payload()
        .unwrap();

        prop_assert_eq!(payload.nome, nome);
        prop_assert_eq!(payload.categoria, "Ferramentas");
        prop_assert!(payload.descricao.is_none());
        prop_assert!(payload.tamanho.is_none());
        prop_assert_eq!(payload.estoque_minimo, minimo);
    }
}
