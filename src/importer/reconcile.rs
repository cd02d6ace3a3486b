/// Fills in missing record ids without touching usable ones.
///
/// `raw` holds the numeric reading of the id cell per row, in row order,
/// `None` where the cell was empty or unparseable. Fractions truncate toward
/// zero. When no row has an id the whole column is numbered `1..=n`;
/// otherwise rows whose id is missing or zero get fresh ids counting up from
/// the current maximum, and every other id is kept as-is, negatives and
/// duplicates included.
pub fn reconcile_ids(raw: &[Option<f64>]) -> Vec<i64> {
    let parsed: Vec<Option<i64>> = raw
        .iter()
        .map(|v| v.filter(|v| v.is_finite()).map(|v| v as i64))
        .collect();

    if parsed.iter().all(Option::is_none) {
        return (1..=parsed.len() as i64).collect();
    }

    // Fresh ids start past the highest id seen, never below 1.
    let mut next = parsed.iter().flatten().copied().max().unwrap_or(0).max(0);

    parsed
        .into_iter()
        .map(|v| match v {
            Some(id) if id != 0 => id,
            _ => {
                next += 1;
                next
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![expect(clippy::indexing_slicing)]
    use super::*;

    #[test]
    fn test_all_absent_numbers_from_one() {
        assert_eq!(reconcile_ids(&[None, None, None]), vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_input() {
        assert!(reconcile_ids(&[]).is_empty());
    }

    #[test]
    fn test_absent_and_zero_filled_past_max() {
        let raw = [Some(5.0), None, Some(0.0), Some(2.0)];
        assert_eq!(reconcile_ids(&raw), vec![5, 6, 7, 2]);
    }

    #[test]
    fn test_fractional_ids_truncate() {
        assert_eq!(reconcile_ids(&[Some(3.7), None]), vec![3, 4]);
        assert_eq!(reconcile_ids(&[Some(0.4)]), vec![1]);
    }

    #[test]
    fn test_negative_ids_kept_but_ignored_for_numbering() {
        assert_eq!(reconcile_ids(&[Some(-3.0), None]), vec![-3, 1]);
    }

    #[test]
    fn test_duplicates_are_not_repaired() {
        assert_eq!(reconcile_ids(&[Some(2.0), Some(2.0), None]), vec![2, 2, 3]);
    }

    #[test]
    fn test_generated_ids_strictly_increase_and_clear_existing() {
        let raw = [None, Some(9.0), None, Some(4.0), Some(0.0), None];
        let ids = reconcile_ids(&raw);
        assert_eq!(ids.len(), raw.len());

        let v_max = 9;
        let generated: Vec<i64> = ids
            .iter()
            .zip(raw.iter())
            .filter(|(_, r)| r.is_none() || **r == Some(0.0))
            .map(|(id, _)| *id)
            .collect();
        assert_eq!(generated, vec![10, 11, 12, 13]);
        assert!(generated.iter().all(|id| *id > v_max));

        // Kept values are untouched
        assert_eq!(ids[1], 9);
        assert_eq!(ids[3], 4);
    }
}
