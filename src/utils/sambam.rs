//! Helpers for text emitted by samtools.


/// Keeps the given 1-based, tab-separated columns of every line, like `cut -f`.
/// Lines without a tab pass through whole; missing columns are skipped.
///
/// # Arguments
///
/// * `text` - Tab-separated input, e.g. `samtools idxstats` output.
/// * `columns` - 1-based column numbers, in output order.
///
/// # Returns
/// Newline-terminated output text.
pub fn select_columns(text: &str, columns: &[usize]) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if !line.contains('\t') {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        let selected: Vec<&str> = columns
            .iter()
            .filter_map(|&c| c.checked_sub(1).and_then(|i| fields.get(i).copied()))
            .collect();
        out.push_str(&selected.join("\t"));
        out.push('\n');
    }
    out
}

/// Reduces `samtools idxstats` output (name, length, mapped, unmapped) to name and mapped count.
pub fn idxstats_to_raw_counts(idxstats: &str) -> String {
    select_columns(idxstats, &[1, 3])
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idxstats_to_raw_counts() {
        let idxstats = "hsa-let-7a-5p\t22\t1520\t0\nhsa-miR-21-5p\t22\t8841\t0\n*\t0\t0\t312\n";
        assert_eq!(
            idxstats_to_raw_counts(idxstats),
            "hsa-let-7a-5p\t1520\nhsa-miR-21-5p\t8841\n*\t0\n"
        );
    }

    #[test]
    fn test_line_without_tab_passes_through() {
        assert_eq!(select_columns("no tabs here\n", &[1, 3]), "no tabs here\n");
    }

    #[test]
    fn test_missing_columns_are_skipped() {
        assert_eq!(select_columns("a\tb\n", &[1, 3]), "a\n");
        assert_eq!(select_columns("a\tb\tc\td", &[1, 3]), "a\tc\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(idxstats_to_raw_counts(""), "");
    }
}
