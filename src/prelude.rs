use std::fs::{read_dir, read_to_string};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::lox::Lox;

/// The `.lox` files directly inside `dir`, sorted by name
pub fn prelude_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in read_dir(dir).with_context(|| format!("Unable to read prelude directory {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|extension| extension == "lox") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Run every prelude file into the session's globals
/// Any error, static or runtime, aborts loading
pub fn load_prelude(lox: &mut Lox, dir: &Path) -> Result<()> {
    for path in prelude_files(dir)? {
        let script = read_to_string(&path)
            .with_context(|| format!("Unable to read prelude file {}", path.display()))?;
        let outcome = lox.run(&script);
        if let Some(first) = outcome.diagnostics.first() {
            return Err(anyhow!("{}", first).context(format!("Unable to load prelude file {}", path.display())));
        }
        tracing::debug!(path = %path.display(), "loaded prelude file");
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::lox::OutputBuffer;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("loxwalk-prelude-{}-{}", name, std::process::id()));
        _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_in_name_order() {
        let dir = scratch_dir("order");
        fs::write(dir.join("b.lox"), "var greeting = greeting + \" world\";").unwrap();
        fs::write(dir.join("a.lox"), "var greeting = \"hello\";").unwrap();
        fs::write(dir.join("notes.txt"), "not lox at all").unwrap();

        let output = OutputBuffer::default();
        let mut lox = Lox::with_output(Box::new(output.clone()));
        load_prelude(&mut lox, &dir).unwrap();
        lox.run("print greeting;");
        assert_eq!("hello world\n", output.contents());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn broken_prelude_aborts() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("a.lox"), "print 1 +;").unwrap();

        let mut lox = Lox::with_output(Box::new(std::io::sink()));
        let error = load_prelude(&mut lox, &dir).unwrap_err();
        assert!(format!("{:#}", error).contains("Expect expression."));

        fs::remove_dir_all(&dir).unwrap();
    }
}
