mod seeker;

pub use seeker::*;
