use crate::server::ServerRouter;

mod books;
mod feed;
mod recommendations;
mod rooms;
mod threads;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(books::routes())
        .merge(feed::routes())
        .merge(recommendations::routes())
        .merge(rooms::routes())
        .merge(threads::routes())
        .merge(users::routes())
}
