pub mod auth;
pub mod dispatcher;
pub mod graphql;
pub mod handlers;
pub mod middleware;
pub mod resolvers;
