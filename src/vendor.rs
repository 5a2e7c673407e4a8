//! Vendored path detection.
//!
//! Third-party and generated code is excluded from authorship analysis. The
//! built-in classifier marks such paths as vendored, the same way the external
//! classifier reports it in its `vendored` flag.

use fancy_regex::Regex;

lazy_static::lazy_static! {
    static ref VENDOR_REGEX: Regex = {
        let patterns = [
            // Dependency and build output directories
            r"(^|/)node_modules/",
            r"(^|/)bower_components/",
            r"(^|/)vendors?/",
            r"(^|/)[Vv]+endor/",
            r"^[Dd]ependencies/",
            r"^deps/",
            r"(^|/)dist/",
            r"(^|/)cache/",
            r"(^|/)\.yarn/(releases|plugins|sdks|versions|unplugged)/",
            r"(3rd|[Tt]hird)[-_]?[Pp]arty/",
            r"(^|/)[Ee]xtern(als?)?/",

            // Autotools output
            r"(^|/)configure$",
            r"(^|/)config\.(guess|sub)$",
            r"(^|/)(aclocal|libtool|ltoptions|ltsugar|ltversion|lt~obsolete)\.m4$",

            // Bundled front-end libraries
            r"(\.|-)min\.(js|css)$",
            r"(^|/)bootstrap([^/.]*)(\..*)?\.(js|css|less|scss|styl)$",
            r"(^|/)jquery([^.]*)\.js$",
            r"(^|/)jquery\-ui(\-\d\.\d+(\.\d+)?)?(\.\w+)?\.(js|css)$",

            // Install scripts checked in verbatim
            r"(^|/)dotnet-install\.(ps1|sh)$",
            r"(^|/)gradlew(\.bat)?$",
            r"(^|/)mvnw(\.cmd)?$",
        ];
        // Patterns are constants; failure here is a programming error
        Regex::new(&patterns.join("|")).unwrap()
    };
}

/// Check if a repository-relative path points at vendored code
///
/// # Arguments
///
/// * `path` - The path to check, with `/` separators
///
/// # Returns
///
/// * `bool` - True if the path is vendored
pub fn is_vendored(path: &str) -> bool {
    VENDOR_REGEX.is_match(path).unwrap_or(false)
}
