//! Crawler identity presented to sitemap hosts.

use rand::seq::SliceRandom;

/// Googlebot-style agents rotated per request.
pub const BOT_AGENTS: &[&str] = &[
    "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
    "Mozilla/5.0 AppleWebKit/537.36 (KHTML, like Gecko; compatible; Googlebot/2.1; +http://www.google.com/bot.html) Safari/537.36",
];

/// Pick a user agent for the next request.
pub fn pick_user_agent() -> &'static str {
    BOT_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BOT_AGENTS[0])
}
