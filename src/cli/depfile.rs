use std::io;
use std::path::{Path, PathBuf};

/// Default dependency file path: `<output>.d`.
pub fn default_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".d");
    PathBuf::from(name)
}

/// Spaces and `#` would break a make rule.
fn escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            ' ' => out.push_str("\\ "),
            '#' => out.push_str("\\#"),
            '$' => out.push_str("$$"),
            _ => out.push(c),
        }
    }
    out
}

/// Make rule listing the input first, then every other dependency once.
pub fn render(target: &str, input: &str, dependencies: &[String]) -> String {
    let mut prereqs = vec![input];
    for dep in dependencies {
        if !prereqs.contains(&dep.as_str()) {
            prereqs.push(dep.as_str());
        }
    }
    let escaped: Vec<String> = prereqs.iter().map(|p| escape(p)).collect();
    format!("{}: {}\n", escape(target), escaped.join(" \\\n  "))
}

pub fn write(path: &Path, target: &str, input: &str, dependencies: &[String]) -> io::Result<()> {
    std::fs::write(path, render(target, input, dependencies))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_rule() {
        let deps = vec![
            "shaders.cpp".to_string(),
            "/usr/include/hsh/hsh.h".to_string(),
            "my dir/common.h".to_string(),
        ];
        assert_eq!(
            render("out/shaders.hshhead", "shaders.cpp", &deps),
            "out/shaders.hshhead: shaders.cpp \\\n  /usr/include/hsh/hsh.h \\\n  my\\ dir/common.h\n"
        );
    }

    #[test]
    fn test_input_only() {
        assert_eq!(render("a.h", "a.json", &[]), "a.h: a.json\n");
    }

    #[test]
    fn test_default_path_appends_suffix() {
        assert_eq!(default_path(Path::new("gen/x.hshhead")), PathBuf::from("gen/x.hshhead.d"));
    }

    #[test]
    fn test_write_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.d");
        write(&path, "x.h", "x.cpp", &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x.h: x.cpp\n");
    }
}
