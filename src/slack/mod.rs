mod client;
mod dispatch;
mod events;
mod markup;
pub mod socket;
mod types;

pub use client::SlackClient;
pub use dispatch::{Dispatcher, MAX_BODY_CHARS, truncate_body};
pub use events::{
    Attachment, Comment, EventHandler, FileObject, MessageEvent, MessageFrame, NamedEntity,
    RtmErrorBody, RtmEvent,
};
pub use markup::{normalize, unescape_html};
pub use types::{
    ApiChannel, ApiProfile, ApiUser, ApiUserGroup, ChannelId, ConversationsInfoResponse,
    Identity, RtmConnectResponse, SlackTs, TeamInfo, UserGroupsListResponse, UserId,
    UsersInfoResponse,
};
