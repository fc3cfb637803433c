// Defaults for the relay configuration - these are the single source of truth for defaults

/// Mount used when no explicit API base is configured anywhere.
pub const DEFAULT_API_BASE: &str = "/api";

// Storage keys shared with the sibling UIs
pub const DEFAULT_API_STORAGE_KEY: &str = "sv13.api";
pub const DEFAULT_TOKEN_STORAGE_KEY: &str = "sv13.token";

// Query parameters read on load and written onto propagated links
pub const QUERY_PARAM_API: &str = "api";
pub const QUERY_PARAM_TOKEN: &str = "token";

/// Root-relative API groups that `fetch` calls get redirected for.
pub const DEFAULT_PATH_PREFIXES: &[&str] = &[
    "/duel",
    "/bot",
    "/summary",
    "/user",
    "/packReveal",
    "/collection",
    "/reveal",
    "/spectate",
    "/watch",
    "/live",
];

/// Cross-origin pages that receive `?token&api` on outbound links
/// (same-origin is always allowed).
pub const DEFAULT_PASS_HOSTS: &[&str] = &[
    "https://madv313.github.io/HUB-UI/",
    "https://madv313.github.io/Player-Stats-UI/",
    "https://madv313.github.io/Stats-Leaderboard-UI/",
];

// Per-link opt-in markers
pub const DEFAULT_OPT_IN_ATTRIBUTE: &str = "data-pass-params";
pub const DEFAULT_OPT_IN_CLASS: &str = "sv13-link";

// Window globals read from / written for non-module host code
pub const GLOBAL_API_BASE: &str = "API_BASE";
pub const GLOBAL_PLAYER_TOKEN: &str = "PLAYER_TOKEN";
pub const GLOBAL_UI_BASE: &str = "UI_BASE";
pub const GLOBAL_API_URL_FN: &str = "apiUrl";
pub const GLOBAL_STAGED_CONFIG: &str = "PAGE_RELAY_CONFIG";
pub const GLOBAL_FETCH_MARKER: &str = "__FETCH_SHIM_INSTALLED__";

pub const LOG_PREFIX: &str = "[page-relay]";
