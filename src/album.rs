use super::*;

pub(super) const PAGE_SIZE: usize = 12;

/// A user's last-used album selection. Created on first use, mutated on
/// every invocation, kept for the lifetime of the process.
#[derive(Clone, Debug, PartialEq)]
pub(super) struct ViewState {
    pub(super) page: usize,
    pub(super) filters: Vec<CardFilter>,
    pub(super) sort: SortKey,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            page: 0,
            filters: Vec::new(),
            sort: SortKey::Id,
        }
    }
}

/// `Id` is the source ordering of the album and leaves it untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SortKey {
    Id,
    Name,
    Attribute,
    Rarity,
}

impl SortKey {
    fn parse(token: &str) -> Option<SortKey> {
        match token {
            "id" => Some(SortKey::Id),
            "name" => Some(SortKey::Name),
            "attribute" => Some(SortKey::Attribute),
            "rarity" => Some(SortKey::Rarity),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(super) enum CardFilter {
    Rarity(HashSet<Rarity>),
    Attribute(HashSet<Attribute>),
}

impl CardFilter {
    fn matches(&self, card: &Card) -> bool {
        match self {
            CardFilter::Rarity(allowed) => allowed.contains(&card.rarity),
            CardFilter::Attribute(allowed) => allowed.contains(&card.attribute),
        }
    }
}

/// Per-user view states, keyed by chat-platform user id. Last write wins
/// when the same user runs the command concurrently.
pub(super) struct ViewStateStore {
    states: Mutex<HashMap<u64, ViewState>>,
}

impl ViewStateStore {
    pub(super) fn new() -> Self {
        ViewStateStore {
            states: Mutex::new(HashMap::new()),
        }
    }

    pub(super) async fn get(&self, user_id: u64) -> ViewState {
        self.states
            .lock()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub(super) async fn put(&self, user_id: u64, state: ViewState) {
        self.states.lock().await.insert(user_id, state);
    }
}

/// Applies command tokens to a view state. Tokens are case-insensitive;
/// unrecognized tokens are ignored.
pub(super) fn parse_album_arguments(view: &mut ViewState, args: &[&str]) {
    for arg in args {
        let arg = arg.to_lowercase();
        if arg == "all" {
            view.filters.clear();
        } else if let Ok(page) = arg.parse::<usize>() {
            // Pages are 1-based on the wire; clamping happens in page_slice.
            view.page = page.saturating_sub(1);
        } else if let Some(sort) = SortKey::parse(&arg) {
            view.sort = sort;
        } else if let Ok(rarity) = arg.parse::<Rarity>() {
            add_rarity_filter(&mut view.filters, rarity);
        } else if let Ok(attribute) = arg.parse::<Attribute>() {
            add_attribute_filter(&mut view.filters, attribute);
        }
    }
}

fn add_rarity_filter(filters: &mut Vec<CardFilter>, rarity: Rarity) {
    for filter in filters.iter_mut() {
        if let CardFilter::Rarity(allowed) = filter {
            allowed.insert(rarity);
            return;
        }
    }
    filters.push(CardFilter::Rarity(HashSet::from([rarity])));
}

fn add_attribute_filter(filters: &mut Vec<CardFilter>, attribute: Attribute) {
    for filter in filters.iter_mut() {
        if let CardFilter::Attribute(allowed) = filter {
            allowed.insert(attribute);
            return;
        }
    }
    filters.push(CardFilter::Attribute(HashSet::from([attribute])));
}

/// Keeps cards matching every filter. An empty filter list keeps everything.
pub(super) fn apply_filters(album: Vec<Card>, filters: &[CardFilter]) -> Vec<Card> {
    album
        .into_iter()
        .filter(|card| filters.iter().all(|filter| filter.matches(card)))
        .collect()
}

/// Stable sort by the selected key. Rarity and attribute order by their
/// fixed rank tables, not by the textual value.
pub(super) fn apply_sort(album: &mut [Card], sort: SortKey) {
    match sort {
        SortKey::Id => {}
        SortKey::Name => album.sort_by(|a, b| a.name.cmp(&b.name)),
        SortKey::Attribute => album.sort_by_key(|card| card.attribute.rank()),
        SortKey::Rarity => album.sort_by_key(|card| card.rarity.rank()),
    }
}

/// Clamps the requested page to the album's valid range, writes the clamped
/// value back, and returns the page's cards. An empty album yields page 0
/// and an empty slice.
pub(super) fn page_slice(album: &[Card], page: &mut usize) -> Vec<Card> {
    let max_page = ((album.len() + PAGE_SIZE - 1) / PAGE_SIZE).saturating_sub(1);
    if *page > max_page {
        *page = max_page;
    }
    let start = (*page * PAGE_SIZE).min(album.len());
    let end = (start + PAGE_SIZE).min(album.len());
    album[start..end].to_vec()
}
