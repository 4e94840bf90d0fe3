use std::path::Path;

pub const UNKNOWN_LANGUAGE: &str = "Other";

const SPECIAL_FILENAMES: &[(&str, &str)] = &[
    ("Dockerfile", "Dockerfile"),
    ("Makefile", "Makefile"),
    ("makefile", "Makefile"),
    ("GNUmakefile", "Makefile"),
    ("CMakeLists.txt", "CMake"),
    ("Gemfile", "Ruby"),
    ("Rakefile", "Ruby"),
    ("Jenkinsfile", "Groovy"),
    ("Vagrantfile", "Ruby"),
    (".dockerignore", "Docker"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "Python"),
    ("ipynb", "Jupyter"),
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("java", "Java"),
    ("kt", "Kotlin"),
    ("swift", "Swift"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("php", "PHP"),
    ("rb", "Ruby"),
    ("cs", "C#"),
    ("c", "C"),
    ("h", "C/C++ Headers"),
    ("cpp", "C++"),
    ("cc", "C++"),
    ("hpp", "C++"),
    ("mm", "Objective-C++"),
    ("m", "Objective-C"),
    ("scala", "Scala"),
    ("sql", "SQL"),
    ("tf", "Terraform"),
    ("yml", "YAML"),
    ("yaml", "YAML"),
    ("json", "JSON"),
    ("toml", "TOML"),
    ("ini", "INI"),
    ("md", "Markdown"),
    ("rst", "reStructuredText"),
    ("html", "HTML"),
    ("htm", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("sass", "Sass"),
    ("less", "Less"),
    ("sh", "Shell"),
    ("bash", "Shell"),
    ("zsh", "Shell"),
    ("ps1", "PowerShell"),
    ("bat", "Batch"),
    ("gradle", "Gradle"),
    ("xml", "XML"),
    ("proto", "Protobuf"),
];

/// Approximate language label for a repository-relative path.
pub fn language_for_path(path: &str) -> &'static str {
    let normalized = path.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or(normalized.as_str());

    if let Some((_, lang)) = SPECIAL_FILENAMES.iter().find(|(name, _)| *name == base) {
        return *lang;
    }
    if base.to_ascii_lowercase().starts_with("dockerfile.") {
        return "Dockerfile";
    }

    let ext = Path::new(base)
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or(UNKNOWN_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extensions_case_insensitively() {
        assert_eq!(language_for_path("src/main.rs"), "Rust");
        assert_eq!(language_for_path("web/App.TSX"), "TypeScript");
        assert_eq!(language_for_path("a\\b\\c.py"), "Python");
    }

    #[test]
    fn special_filenames() {
        assert_eq!(language_for_path("Dockerfile"), "Dockerfile");
        assert_eq!(language_for_path("deploy/Dockerfile.prod"), "Dockerfile");
        assert_eq!(language_for_path("native/CMakeLists.txt"), "CMake");
        assert_eq!(language_for_path("Makefile"), "Makefile");
    }

    #[test]
    fn unknown_goes_to_other() {
        assert_eq!(language_for_path("LICENSE"), UNKNOWN_LANGUAGE);
        assert_eq!(language_for_path("data.bin"), UNKNOWN_LANGUAGE);
        assert_eq!(language_for_path(""), UNKNOWN_LANGUAGE);
    }
}
