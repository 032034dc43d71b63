//! Domain entities and the request/response payloads built from them

pub mod post;
pub mod tag;
pub mod user;

pub use post::{
    NewPost, Post, PostChanges, PostDetail, PostImageResponse, PostPayload, PostStatus,
    PostSummary,
};
pub use tag::{Tag, TagPayload, TagResponse};
pub use user::{
    CreateUserRequest, NewUser, TokenRequest, TokenResponse, UpdateProfileRequest, UpdateUser,
    User, UserResponse,
};
