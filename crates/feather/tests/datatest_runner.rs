//! File-driven script corpus: each `tests/cases/*.tcl` file is a complete
//! script whose final result must equal its `# expect:` header.

use std::path::Path;

use feather::Interp;

fn case(path: &Path) -> datatest_stable::Result<()> {
    let source = std::fs::read_to_string(path)?;
    let expected = source
        .lines()
        .find_map(|line| line.strip_prefix("# expect: "))
        .ok_or("case file missing a `# expect:` header")?
        .to_owned();

    let mut interp = Interp::new();
    let actual = interp
        .eval(&source)
        .map_err(|e| format!("{} failed: {}\n{}", path.display(), e, e.error_info()))?;
    if actual != expected {
        return Err(format!(
            "{}: expected {expected:?}, got {actual:?}",
            path.display()
        )
        .into());
    }
    Ok(())
}

datatest_stable::harness!(case, "tests/cases", r"^.*\.tcl$");
