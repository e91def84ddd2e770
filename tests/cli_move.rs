//! End-to-end tests of the CLI front door on throw-away projects.

use std::fs;
use std::path::Path;

use pymove::cli::{run_graph, run_move};
use pymove::error::PymoveError;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "pyproject.toml",
        "[project]\nname = \"shop\"\n\n[tool.pymove]\nfolders = [\"shop\"]\n",
    );
    write(root, "shop/__init__.py", "");
    write(
        root,
        "shop/pricing.py",
        "import math\n\nRATE = 0.2\n\n\ndef gross(net):\n    return math.ceil(net * (1 + RATE))\n\n\ndef label(net):\n    return f\"{gross(net)} EUR\"\n",
    );
    write(root, "shop/tax.py", "ZERO = 0\n");
    write(root, "shop/cart.py", "from shop.pricing import gross\n\n\ndef total(items):\n    return sum(gross(i) for i in items)\n");
    write(root, "shop/report.py", "from .pricing import gross\n\nprint(gross(10))\n");
    write(root, "shop/legacy.py", "import shop.pricing\n\nprint(shop.pricing.gross(1))\n");
    dir
}

fn edges(root: &Path) -> Vec<(String, String)> {
    let json: serde_json::Value = serde_json::from_str(&run_graph(root).unwrap()).unwrap();
    json["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| {
            (
                e["dependent"].as_str().unwrap().to_string(),
                e["dependency"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[test]
fn move_rewrites_every_dependent() {
    let dir = project();
    let root = dir.path();
    let out = run_move(root, "shop/pricing.py:6:1", "shop/tax.py:2", true, false).unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["symbol"], "shop.pricing.gross");
    assert_eq!(json["applied"], true);

    let tax = read(root, "shop/tax.py");
    assert!(tax.contains("def gross(net):\n    return math.ceil(net * (1 + RATE))\n"));
    assert!(tax.contains("import math\n"));
    assert!(tax.contains("from shop.pricing import RATE\n"));

    let pricing = read(root, "shop/pricing.py");
    assert!(!pricing.contains("def gross"));
    assert!(pricing.contains("from shop.tax import gross\n"));

    let cart = read(root, "shop/cart.py");
    assert!(cart.contains("from shop.tax import gross\n"));
    assert!(!cart.contains("shop.pricing"));

    let report = read(root, "shop/report.py");
    assert!(report.contains("from shop.tax import gross\n"));

    let legacy = read(root, "shop/legacy.py");
    assert!(legacy.contains("from shop.tax import gross\n"));
    assert!(legacy.contains("print(gross(1))\n"));
}

#[test]
fn graph_after_apply_matches_moved_imports() {
    let dir = project();
    let root = dir.path();
    run_move(root, "shop/pricing.py:6:1", "shop/tax.py:2", true, false).unwrap();
    let edges = edges(root);
    assert!(edges.contains(&("shop.cart".to_string(), "shop.tax".to_string())));
    assert!(edges.contains(&("shop.report".to_string(), "shop.tax".to_string())));
    assert!(!edges.contains(&("shop.cart".to_string(), "shop.pricing".to_string())));
}

#[test]
fn dry_run_reports_diffs_only() {
    let dir = project();
    let root = dir.path();
    let before = read(root, "shop/cart.py");
    let out = run_move(root, "shop/pricing.py:6:1", "shop/tax.py:2", false, false).unwrap();
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let files = json["files"].as_array().unwrap();
    let cart = files
        .iter()
        .find(|f| f["path"] == "shop/cart.py")
        .unwrap();
    assert!(cart["diff"]
        .as_str()
        .unwrap()
        .contains("+from shop.tax import gross\n"));
    assert_eq!(read(root, "shop/cart.py"), before);
}

#[test]
fn position_on_statement_that_is_not_a_definition() {
    let dir = project();
    let err = run_move(dir.path(), "shop/pricing.py:3:1", "shop/tax.py:1", false, false)
        .unwrap_err();
    assert!(matches!(err, PymoveError::NothingToMove { line: 3, .. }));
}

#[test]
fn missing_project_is_reported() {
    let dir = TempDir::new().unwrap();
    let err = run_graph(dir.path()).unwrap_err();
    assert!(matches!(err, PymoveError::ProjectNotFound { .. }));
}
