// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

const USAGE: &str = "usage: folio-openapi (--out <path> | --check <path> | --stdout)";

enum Mode {
    Write(PathBuf),
    Check(PathBuf),
    Stdout,
}

fn parse_mode(mut args: impl Iterator<Item = String>) -> Result<Mode, String> {
    let flag = args.next().ok_or_else(|| USAGE.to_string())?;
    let mode = match flag.as_str() {
        "--stdout" => Mode::Stdout,
        "--out" | "--check" => {
            let path = args
                .next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{flag} needs a file path\n{USAGE}"))?;
            if flag == "--out" {
                Mode::Write(path)
            } else {
                Mode::Check(path)
            }
        }
        other => return Err(format!("unknown argument `{other}`\n{USAGE}")),
    };
    match args.next() {
        Some(extra) => Err(format!("unexpected argument `{extra}`\n{USAGE}")),
        None => Ok(mode),
    }
}

fn render() -> Result<String, String> {
    let doc = folio_api::openapi_v1_spec();
    let mut text = serde_json::to_string_pretty(&doc)
        .map_err(|e| format!("encode folio OpenAPI document: {e}"))?;
    text.push('\n');
    Ok(text)
}

fn main() -> Result<(), String> {
    let rendered = render()?;
    match parse_mode(std::env::args().skip(1))? {
        Mode::Stdout => print!("{rendered}"),
        Mode::Write(out) => {
            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("create {}: {e}", parent.display()))?;
            }
            fs::write(&out, rendered).map_err(|e| format!("write {}: {e}", out.display()))?;
            println!("folio OpenAPI document written to {}", out.display());
        }
        Mode::Check(path) => {
            let committed =
                fs::read_to_string(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
            if committed != rendered {
                return Err(format!(
                    "{} is stale; regenerate with `folio-openapi --out {}`",
                    path.display(),
                    path.display()
                ));
            }
            println!("{} matches the served folio API", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> std::vec::IntoIter<String> {
        raw.iter().map(|s| (*s).to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn accepts_each_mode() {
        assert!(matches!(parse_mode(args(&["--stdout"])), Ok(Mode::Stdout)));
        assert!(matches!(
            parse_mode(args(&["--out", "docs/openapi.json"])),
            Ok(Mode::Write(p)) if p == PathBuf::from("docs/openapi.json")
        ));
        assert!(matches!(
            parse_mode(args(&["--check", "openapi.json"])),
            Ok(Mode::Check(_))
        ));
    }

    #[test]
    fn rejects_missing_paths_and_extra_arguments() {
        let err = parse_mode(args(&["--out"])).err().expect("missing path");
        assert!(err.starts_with("--out needs a file path"));
        let err = parse_mode(args(&["--stdout", "x"])).err().expect("extra arg");
        assert!(err.contains("unexpected argument `x`"));
        assert_eq!(parse_mode(args(&[])).err().as_deref(), Some(USAGE));
    }

    #[test]
    fn rendered_document_ends_with_newline() {
        let text = render().expect("render");
        assert!(text.ends_with("}\n"));
        assert!(text.contains("/analytics/ab-test/assign"));
    }
}
