use super::*;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub(super) enum StoreError {
    #[error("The card database is not available; album commands are disabled.")]
    NotConfigured,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unrecognized rarity value: {0}")]
    UnknownRarity(String),

    #[error("unrecognized attribute value: {0}")]
    UnknownAttribute(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(super) enum Rarity {
    Ur,
    Ssr,
    Sr,
    R,
    N,
}

impl Rarity {
    /// Display rank, best first.
    pub(super) fn rank(self) -> u8 {
        match self {
            Rarity::Ur => 0,
            Rarity::Ssr => 1,
            Rarity::Sr => 2,
            Rarity::R => 3,
            Rarity::N => 4,
        }
    }

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Rarity::Ur => "UR",
            Rarity::Ssr => "SSR",
            Rarity::Sr => "SR",
            Rarity::R => "R",
            Rarity::N => "N",
        }
    }
}

impl FromStr for Rarity {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ur" => Ok(Rarity::Ur),
            "ssr" => Ok(Rarity::Ssr),
            "sr" => Ok(Rarity::Sr),
            "r" => Ok(Rarity::R),
            "n" => Ok(Rarity::N),
            _ => Err(StoreError::UnknownRarity(s.to_string())),
        }
    }
}

impl TryFrom<String> for Rarity {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rarity> for String {
    fn from(value: Rarity) -> String {
        value.as_str().to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(super) enum Attribute {
    Smile,
    Pure,
    Cool,
}

impl Attribute {
    pub(super) fn rank(self) -> u8 {
        match self {
            Attribute::Smile => 0,
            Attribute::Pure => 1,
            Attribute::Cool => 2,
        }
    }

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Attribute::Smile => "Smile",
            Attribute::Pure => "Pure",
            Attribute::Cool => "Cool",
        }
    }
}

impl FromStr for Attribute {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smile" => Ok(Attribute::Smile),
            "pure" => Ok(Attribute::Pure),
            "cool" => Ok(Attribute::Cool),
            _ => Err(StoreError::UnknownAttribute(s.to_string())),
        }
    }
}

impl TryFrom<String> for Attribute {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Attribute> for String {
    fn from(value: Attribute) -> String {
        value.as_str().to_string()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(super) struct Card {
    pub(super) id: u32,
    pub(super) name: String,
    pub(super) attribute: Attribute,
    pub(super) rarity: Rarity,
    #[serde(default)]
    pub(super) round_card_image: Option<String>,
    #[serde(default)]
    pub(super) round_card_idolized_image: Option<String>,
}

impl Card {
    /// Cards may lack an unidolized image and fall back to the idolized one.
    /// Stored URLs can be protocol-relative.
    pub(super) fn image_url(&self) -> Option<String> {
        let url = self
            .round_card_image
            .as_deref()
            .or(self.round_card_idolized_image.as_deref())?;
        if let Some(rest) = url.strip_prefix("//") {
            Some(format!("https://{}", rest))
        } else {
            Some(url.to_string())
        }
    }
}

/// Card albums keyed by user id, held in a JSON file.
pub(super) struct CardStore {
    path: Option<PathBuf>,
}

impl CardStore {
    pub(super) fn new(path: Option<PathBuf>) -> Self {
        CardStore { path }
    }

    /// Reads the album fresh on every call; nothing is cached.
    pub(super) fn get_user_album(&self, user_id: u64) -> Result<Vec<Card>, StoreError> {
        let path = self.path.as_deref().ok_or(StoreError::NotConfigured)?;
        if !path.exists() {
            return Err(StoreError::NotConfigured);
        }
        let contents = fs::read_to_string(path)?;
        let mut albums: HashMap<String, Vec<Card>> = serde_json::from_str(&contents)?;
        Ok(albums.remove(&user_id.to_string()).unwrap_or_default())
    }
}
