use pretty_assertions::assert_eq;
use statrs::assert_almost_eq;

use ksgsea_lib::{Error, MalformedError};

const THRESHOLD: f64 = 0.0001;

#[test]
fn read_gmt() {
    let gmt = ksgsea_lib::readers::read_gmt_file("data/small.gmt").unwrap();
    assert_eq!(gmt.len(), 6);
    assert_eq!(gmt[0].name, "TOP_SET");
    assert_eq!(gmt[0].description.as_deref(), Some("top twenty"));
    assert_eq!(gmt[0].num_members(), 20);
    assert_eq!(gmt[2].description, None);
}

#[test]
fn read_rank() {
    let items = ksgsea_lib::readers::read_rank_file("data/small.rnk").unwrap();
    assert_eq!(items.len(), 60);
    assert_eq!(items[0].analyte, "GENE1");
    assert_almost_eq!(items[59].rank, -2.9, THRESHOLD);
}

#[test]
fn read_expression() {
    let ds = ksgsea_lib::readers::read_expression_file("data/small_expr.tsv").unwrap();
    assert_eq!(ds.name, "small_expr");
    assert_eq!(ds.num_features(), 30);
    assert_eq!(ds.num_samples(), 8);
    assert_almost_eq!(ds.row(0)[3], 13.0, THRESHOLD);
}

#[test]
fn read_classes() {
    let t = ksgsea_lib::readers::read_class_file("data/small_classes.txt", false).unwrap();
    assert!(t.is_biphasic());
    assert_eq!(t.class_sizes(), vec![4, 4]);
    assert!(matches!(
        ksgsea_lib::readers::read_class_file("data/small_classes.txt", true),
        Err(Error::Malformed(MalformedError::WrongFormat { .. }))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        ksgsea_lib::readers::read_gmt_file("data/does_not_exist.gmt"),
        Err(Error::Io(_))
    ));
}
