/// Event contracts for chat module wiring.
pub mod events;
pub mod composer;
mod images;
pub mod message_list;
pub mod sidebar;
pub mod view;

pub use composer::ComposerView;
pub use events::{ConversationSelected, NewConversationRequested, UserNotice};
pub use sidebar::ConversationSidebar;
pub use view::ConversationView;
