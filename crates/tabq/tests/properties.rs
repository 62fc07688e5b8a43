use proptest::prelude::*;

use tabq::{Cell, ReadOptions, Table, execute, parse, parse_condition, read_csv_str};

proptest! {
    #[test]
    fn chain_parser_never_panics(input in ".*") {
        let _ = parse(&input);
    }

    #[test]
    fn condition_parser_never_panics(input in ".*") {
        let _ = parse_condition(&input);
    }

    #[test]
    fn csv_reader_never_panics(input in ".*") {
        let _ = read_csv_str(&input, &ReadOptions::default());
    }

    #[test]
    fn and_or_grouping_matches_explicit_parens(
        a in -100.0f64..100.0,
        b in -100.0f64..100.0,
        c in -100.0f64..100.0,
    ) {
        let table = Table::new(vec![
            ("a".to_owned(), vec![Cell::Number(a)]),
            ("b".to_owned(), vec![Cell::Number(b)]),
            ("c".to_owned(), vec![Cell::Number(c)]),
        ])
        .expect("one-row table");

        let implicit = execute("where(a > 1 & b > 2 | c > 3).count()", table.clone())
            .expect("implicit grouping evaluates");
        let explicit = execute("where((a > 1 & b > 2) | (c > 3)).count()", table)
            .expect("explicit grouping evaluates");
        prop_assert_eq!(implicit, explicit);
    }
}
