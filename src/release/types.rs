use serde::Deserialize;

/// The latest release of a repository. Only the fields we consume.
///
/// See <https://docs.github.com/en/rest/releases/releases#get-the-latest-release>.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub login: String,
}

/// One downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

impl Release {
    /// Find the asset whose name matches `filename` exactly.
    pub fn asset(&self, filename: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == filename)
    }
}
