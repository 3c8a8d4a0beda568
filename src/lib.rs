pub mod social;

// 重新导出常用类型和函数，方便外部使用
pub use social::{
    client::{Backend, ClientConfig, LatenClient},
    for_you::ForYouSection,
    platform::PlatformCapabilities,
    store::{RemoteStore, RestStoreConfig, SqliteStore},
    suggestion::{FriendSuggester, SuggestedUser, SuggestionConfig},
};
