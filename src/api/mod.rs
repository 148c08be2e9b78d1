// External collaborators: Discord and Firestore
pub mod discord;
pub mod firebase;
