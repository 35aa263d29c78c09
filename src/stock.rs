//! Pure stock arithmetic shared by the dashboard, the ledger and the CLI.
//!
//! Nothing here touches the database; callers fetch rows and hand them in.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{movimentacao, produto, MovementKind};

/// Anything that has a current stock level and a reorder threshold
pub trait StockLevel {
    fn quantidade_estoque(&self) -> i32;
    fn estoque_minimo(&self) -> i32;
}

impl StockLevel for produto::Model {
    fn quantidade_estoque(&self) -> i32 {
        self.quantidade_estoque
    }

    fn estoque_minimo(&self) -> i32 {
        self.estoque_minimo
    }
}

/// A movement reduced to what the monthly totals need
pub trait MovementAmount {
    fn kind(&self) -> MovementKind;
    fn amount(&self) -> i32;
}

impl MovementAmount for movimentacao::Model {
    fn kind(&self) -> MovementKind {
        self.tipo
    }

    fn amount(&self) -> i32 {
        self.quantidade
    }
}

impl MovementAmount for (MovementKind, i32) {
    fn kind(&self) -> MovementKind {
        self.0
    }

    fn amount(&self) -> i32 {
        self.1
    }
}

/// Strictly below the threshold. Equal to the minimum is not an alert.
pub fn is_below_minimum<P: StockLevel + ?Sized>(product: &P) -> bool {
    product.quantidade_estoque() < product.estoque_minimo()
}

/// Products under their minimum, in the order they were given
pub fn below_minimum<P: StockLevel>(products: &[P]) -> Vec<&P> {
    products.iter().filter(|p| is_below_minimum(*p)).collect()
}

/// Inbound and outbound sums over a set of movements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthlyTotals {
    pub entradas: i64,
    pub saidas: i64,
}

impl MonthlyTotals {
    pub fn from_movements<'a, M, I>(movements: I) -> Self
    where
        M: MovementAmount + 'a,
        I: IntoIterator<Item = &'a M>,
    {
        movements
            .into_iter()
            .fold(Self::default(), |mut totals, movement| {
                let amount = i64::from(movement.amount());
                match movement.kind() {
                    MovementKind::Entrada => totals.entradas += amount,
                    MovementKind::Saida => totals.saidas += amount,
                }
                totals
            })
    }
}

/// First instant of the calendar month containing `now`, where the calendar
/// is read in `offset`.
pub fn month_start(now: DateTime<Utc>, offset: FixedOffset) -> DateTime<Utc> {
    let local = now.with_timezone(&offset).date_naive();
    let first = NaiveDate::from_ymd_opt(local.year(), local.month(), 1).unwrap_or(local);
    let local_midnight = first.and_time(NaiveTime::MIN);
    (local_midnight - offset).and_utc()
}

/// Alert label, e.g. `"3 / 10 unidades"`
pub fn stock_label(quantidade: i32, minimo: i32) -> String {
    format!("{quantidade} / {minimo} unidades")
}

/// `dd/mm/aaaa hh:mm:ss` in the reporting offset
pub fn format_timestamp(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset)
        .format("%d/%m/%Y %H:%M:%S")
        .to_string()
}

/// Stock after applying one movement, or `None` when an outbound movement
/// exceeds what is on hand (or the sum overflows).
pub fn apply_movement(current: i32, kind: MovementKind, quantidade: i32) -> Option<i32> {
    match kind {
        MovementKind::Entrada => current.checked_add(quantidade),
        MovementKind::Saida => current.checked_sub(quantidade).filter(|left| *left >= 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    struct Item(i32, i32);

    impl StockLevel for Item {
        fn quantidade_estoque(&self) -> i32 {
            self.0
        }

        fn estoque_minimo(&self) -> i32 {
            self.1
        }
    }

    fn brasilia() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    #[rstest]
    #[case(3, 10, true)]
    #[case(10, 10, false)]
    #[case(11, 10, false)]
    #[case(0, 0, false)]
    #[case(0, 1, true)]
    fn below_minimum_is_strict(#[case] qty: i32, #[case] min: i32, #[case] expected: bool) {
        assert_eq!(is_below_minimum(&Item(qty, min)), expected);
    }

    #[test]
    fn below_minimum_preserves_order() {
        let items = [Item(1, 5), Item(9, 5), Item(0, 2), Item(5, 5)];
        let alerts = below_minimum(&items);
        let quantities: Vec<i32> = alerts.iter().map(|i| i.0).collect();
        assert_eq!(quantities, vec![1, 0]);
    }

    #[test]
    fn monthly_totals_split_by_kind() {
        let movements = vec![
            (MovementKind::Entrada, 5),
            (MovementKind::Entrada, 5),
            (MovementKind::Saida, 2),
        ];
        let totals = MonthlyTotals::from_movements(&movements);
        assert_eq!(
            totals,
            MonthlyTotals {
                entradas: 10,
                saidas: 2
            }
        );
    }

    #[test]
    fn monthly_totals_of_nothing_are_zero() {
        let none: Vec<(MovementKind, i32)> = Vec::new();
        assert_eq!(MonthlyTotals::from_movements(&none), MonthlyTotals::default());
    }

    #[test]
    fn month_start_uses_local_calendar() {
        // 02:00 UTC on the 1st is still the previous month in Brasília
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 2, 0, 0).unwrap();
        let start = month_start(now, brasilia());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 6, 1, 3, 0, 0).unwrap());

        let now = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();
        let start = month_start(now, brasilia());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 7, 1, 3, 0, 0).unwrap());
    }

    #[test]
    fn month_start_in_utc() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap();
        assert_eq!(
            month_start(now, utc),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn label_and_timestamp_formatting() {
        assert_eq!(stock_label(3, 10), "3 / 10 unidades");

        let at = Utc.with_ymd_and_hms(2024, 3, 5, 13, 7, 9).unwrap();
        assert_eq!(format_timestamp(at, brasilia()), "05/03/2024 10:07:09");
    }

    #[rstest]
    #[case(0, MovementKind::Entrada, 10, Some(10))]
    #[case(10, MovementKind::Saida, 3, Some(7))]
    #[case(7, MovementKind::Saida, 7, Some(0))]
    #[case(7, MovementKind::Saida, 8, None)]
    #[case(i32::MAX, MovementKind::Entrada, 1, None)]
    fn apply_movement_cases(
        #[case] current: i32,
        #[case] kind: MovementKind,
        #[case] qty: i32,
        #[case] expected: Option<i32>,
    ) {
        assert_eq!(apply_movement(current, kind, qty), expected);
    }
}
