pub(crate) mod guild_player;

mod process_transport;
pub(crate) use process_transport::*;

mod youtube_resolver;

mod yt_dlp_fetcher;
pub(crate) use yt_dlp_fetcher::*;
