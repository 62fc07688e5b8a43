use std::io::Write as _;

use tabq::{
    Cell, Error, Evaluated, OutputFormat, ReadOptions, ValidationError, execute, read_csv_path,
    read_csv_str, run_str,
};

const PEOPLE: &str = "\
name,age,salary,department
Alice,25,50000,HR
Bob,30,60000,IT
Charlie,35,70000,Finance
David,40,80000,IT
";

fn people_table() -> tabq::Table {
    read_csv_str(PEOPLE, &ReadOptions::default()).expect("fixture parses")
}

fn run_plain(expression: &str) -> String {
    run_str(expression, PEOPLE, &ReadOptions::default(), OutputFormat::Plain)
        .expect("expression runs")
}

fn run_csv(expression: &str) -> String {
    run_str(expression, PEOPLE, &ReadOptions::default(), OutputFormat::Csv)
        .expect("expression runs")
}

#[test]
fn filter_select_sort_end_to_end() {
    let output = run_plain(
        "where(age >= 30 & department == 'IT').select(name, salary).sortby(salary)",
    );
    assert_eq!(
        output,
        "name   salary\n\
         -----  ------\n\
         Bob    60000\n\
         David  80000\n\
         (2 rows)\n"
    );
}

#[test]
fn strict_comparison_excludes_the_boundary_row() {
    // Bob is exactly 30, so `>` drops him while `>=` keeps him.
    let strict = run_csv("where(age > 30 & department == 'IT').select(name)");
    assert_eq!(strict, "name\nDavid\n");

    let inclusive = run_csv("where(age >= 30 & department == 'IT').select(name)");
    assert_eq!(inclusive, "name\nBob\nDavid\n");
}

#[test]
fn mean_terminal_yields_a_scalar() {
    let result = execute("mean(salary)", people_table()).expect("mean");
    let Evaluated::Scalar(cell) = &result else {
        panic!("mean should produce a scalar, got {result:?}");
    };
    assert_eq!(cell.as_number(), Some(65000.0));

    assert_eq!(run_plain("mean(salary)"), "65000\n");
}

#[test]
fn first_and_last_are_positional() {
    let result = execute("sortby(salary, true).first(name)", people_table()).expect("first");
    let Evaluated::Scalar(cell) = &result else {
        panic!("first should produce a scalar, got {result:?}");
    };
    assert_eq!(cell.as_str(), Some("David"));

    assert_eq!(run_plain("last(name)"), "David\n");
}

#[test]
fn uniqc_counts_in_first_seen_order() {
    assert_eq!(
        run_csv("uniqc(department)"),
        "department,count\nHR,1\nIT,2\nFinance,1\n"
    );
}

#[test]
fn uniq_lists_one_item_per_line() {
    assert_eq!(run_plain("uniq(department)"), "HR\nIT\nFinance\n");
}

#[test]
fn and_binds_tighter_than_or() {
    let input = "\
a,b,c
2,3,0
0,0,9
2,0,0
0,9,9
";
    let options = ReadOptions::default();
    let implicit = run_str(
        "where(a > 1 & b > 2 | c > 3).count()",
        input,
        &options,
        OutputFormat::Plain,
    )
    .expect("implicit grouping");
    let explicit = run_str(
        "where((a > 1 & b > 2) | (c > 3)).count()",
        input,
        &options,
        OutputFormat::Plain,
    )
    .expect("explicit grouping");
    assert_eq!(implicit, explicit);
    assert_eq!(implicit, "3\n");
}

#[test]
fn select_is_idempotent() {
    let once = execute("select(name)", people_table()).expect("select once");
    let twice = execute("select(name).select(name)", people_table()).expect("select twice");
    assert_eq!(once, twice);
}

#[test]
fn no_transform_grows_the_table() {
    let result = execute(
        "where(age >= 25).head(10).tail(10).sortby(name)",
        people_table(),
    )
    .expect("chain runs");
    let Evaluated::Table(table) = &result else {
        panic!("transform chain should produce a table, got {result:?}");
    };
    assert!(table.row_count() <= 4);
    assert_eq!(table.column_count(), 4);
}

#[test]
fn where_matching_nothing_yields_an_empty_table() {
    let result = execute("where(age > 100)", people_table()).expect("filter runs");
    let Evaluated::Table(table) = &result else {
        panic!("where should produce a table, got {result:?}");
    };
    assert!(table.is_empty());
    assert_eq!(table.column_count(), 4);

    assert_eq!(
        run_plain("where(age > 100).select(name)"),
        "name\n----\n(0 rows)\n"
    );
}

#[test]
fn terminal_mid_chain_is_rejected() {
    let error = execute("count().select(name)", people_table()).expect_err("count is terminal");
    assert!(matches!(
        error,
        Error::Validation(ValidationError::TerminalNotLast { .. })
    ));

    execute("select(name).count()", people_table()).expect("terminal in last place");
}

#[test]
fn syntax_errors_carry_full_expression_positions() {
    let error = run_str(
        "where(age >)",
        PEOPLE,
        &ReadOptions::default(),
        OutputFormat::Plain,
    )
    .expect_err("dangling comparison");
    assert!(matches!(error, Error::Syntax(_)));
    assert!(error.to_string().contains("position 11"), "{error}");
}

#[test]
fn scalar_json_shape_is_stable() {
    let result = execute("mean(salary)", people_table()).expect("mean");
    assert_eq!(
        serde_json::to_value(&result).expect("serialize"),
        serde_json::json!({
            "kind": "scalar",
            "value": { "kind": "number", "value": 65000.0 },
        })
    );
}

#[test]
fn reads_fixtures_from_a_file_path() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "{PEOPLE}").expect("write fixture");
    let table = read_csv_path(file.path(), &ReadOptions::default()).expect("read");
    let result = execute("count()", table).expect("count");
    assert_eq!(result, Evaluated::Scalar(Cell::Number(4.0)));
}

#[test]
fn headerless_input_takes_supplied_names() {
    let options = ReadOptions {
        has_header: false,
        column_names: Some(vec!["name".to_owned(), "age".to_owned()]),
        ..ReadOptions::default()
    };
    let output = run_str(
        "where(age > 30).select(name)",
        "Alice,25\nDavid,40\n",
        &options,
        OutputFormat::Csv,
    )
    .expect("headerless run");
    assert_eq!(output, "name\nDavid\n");
}

#[test]
fn tsv_round_trips_through_both_sides() {
    let options = ReadOptions {
        delimiter: b'\t',
        ..ReadOptions::default()
    };
    let output = run_str(
        "select(name, age)",
        "name\tage\nAlice\t25\n",
        &options,
        OutputFormat::Tsv,
    )
    .expect("tsv run");
    assert_eq!(output, "name\tage\nAlice\t25\n");
}
