//! Kind-specific harvesting strategies
//!
//! Each strategy owns exactly the collaborators its kind needs and drives one
//! of two iteration shapes:
//! - remote-paginated: walk the API's pages from the task's `current_page`
//! - local-store-paginated: walk locally stored items after the task's
//!   `last_processed` key, making remote calls per item

mod pull_details;
mod pull_list;
mod repository;
mod review_comments;
mod reviews;
mod users;

pub use pull_details::PullDetailHarvest;
pub use pull_list::PullListHarvest;
pub use repository::RepositoryHarvest;
pub use review_comments::ReviewCommentHarvest;
pub use reviews::ReviewHarvest;
pub use users::{UserHarvest, UserSource};

use crate::task::runner::{Checkpoint, TaskFailure};

/// The strategy bound to a task runner
pub enum Harvest {
    PullList(PullListHarvest),
    Repository(RepositoryHarvest),
    PullDetails(PullDetailHarvest),
    Reviews(ReviewHarvest),
    ReviewComments(ReviewCommentHarvest),
    Users(UserHarvest),
}

impl Harvest {
    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        match self {
            Self::PullList(h) => h.execute(checkpoint).await,
            Self::Repository(h) => h.execute(checkpoint).await,
            Self::PullDetails(h) => h.execute(checkpoint).await,
            Self::Reviews(h) => h.execute(checkpoint).await,
            Self::ReviewComments(h) => h.execute(checkpoint).await,
            Self::Users(h) => h.execute(checkpoint).await,
        }
    }
}
